//! Timestamp codec - artifact 名から作成時刻を取り出す
//!
//! バックアップ artifact の名前は先頭 10 文字が Unix epoch 秒になっている。
//! 例: `1700000000_2023_11_14_16.5.0_gitlab_backup.tar`
//!
//! 「この artifact はいつ作られたか」の唯一の情報源はここ。
//! inventory / orchestrator は `ArtifactNameParser` 経由でのみ時刻を得る。

use thiserror::Error;

/// 時刻プレフィックスの文字数
pub const TIMESTAMP_PREFIX_LEN: usize = 10;

/// ParseError は artifact 名として解釈できない名前
///
/// inventory はこのエラーを「artifact ではない」として扱い、エントリを読み飛ばす。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("name {name:?} is shorter than 10 characters")]
    TooShort { name: String },

    #[error("prefix {prefix:?} of {name:?} is not a base-10 integer")]
    NotAnInteger { name: String, prefix: String },
}

/// Parse the creation timestamp (epoch seconds) from the first 10 characters of `name`.
///
/// Characters, not bytes: a name with multi-byte characters near the prefix
/// boundary is rejected instead of panicking on a bad slice index.
pub fn parse_timestamp(name: &str) -> Result<i64, ParseError> {
    let end = match name.char_indices().nth(TIMESTAMP_PREFIX_LEN) {
        Some((idx, _)) => idx,
        None if name.chars().count() == TIMESTAMP_PREFIX_LEN => name.len(),
        None => {
            return Err(ParseError::TooShort {
                name: name.to_string(),
            });
        }
    };

    let prefix = &name[..end];
    prefix
        .parse::<i64>()
        .map_err(|_| ParseError::NotAnInteger {
            name: name.to_string(),
            prefix: prefix.to_string(),
        })
}

/// ArtifactNameParser は命名規約の抽象化
///
/// 別の命名規約（例: ISO8601 サフィックス）を使う場合はこの trait を実装して
/// inventory に渡せばよい。inventory / orchestrator 側の変更は不要。
pub trait ArtifactNameParser: Send + Sync {
    fn parse(&self, name: &str) -> Result<i64, ParseError>;
}

/// EpochPrefixParser はデフォルトの命名規約（先頭 10 文字 = epoch 秒）
#[derive(Debug, Clone, Copy, Default)]
pub struct EpochPrefixParser;

impl ArtifactNameParser for EpochPrefixParser {
    fn parse(&self, name: &str) -> Result<i64, ParseError> {
        parse_timestamp(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::gitlab_name("1700000000_2023_11_14_16.5.0_gitlab_backup.tar", 1_700_000_000)]
    #[case::exact_length("1000000000", 1_000_000_000)]
    #[case::leading_zeros("0000000042-a.tar", 42)]
    #[case::signed("-000000001.tar", -1)]
    fn parses_epoch_prefix(#[case] name: &str, #[case] expected: i64) {
        assert_eq!(parse_timestamp(name), Ok(expected));
    }

    #[rstest]
    #[case::empty("")]
    #[case::nine_chars("123456789")]
    #[case::multibyte_short("12345678é")]
    fn rejects_short_names(#[case] name: &str) {
        assert!(matches!(
            parse_timestamp(name),
            Err(ParseError::TooShort { .. })
        ));
    }

    #[rstest]
    #[case::word("notanumber.tar")]
    #[case::space_inside("12345 7890.tar")]
    #[case::multibyte_in_prefix("12345678éa.tar")]
    #[case::dot_inside("1700000.00-a.tar")]
    fn rejects_non_numeric_prefix(#[case] name: &str) {
        assert!(matches!(
            parse_timestamp(name),
            Err(ParseError::NotAnInteger { .. })
        ));
    }

    #[test]
    fn round_trips_every_ten_digit_value_we_sample() {
        for value in [0_i64, 1, 999_999_999, 1_000_000_000, 1_600_000_000, 9_999_999_999] {
            let name = format!("{value:010}_gitlab_backup.tar");
            assert_eq!(parse_timestamp(&name), Ok(value));
        }
    }

    #[test]
    fn epoch_prefix_parser_delegates() {
        let parser = EpochPrefixParser;
        assert_eq!(parser.parse("1500000000-b.tar"), Ok(1_500_000_000));
        assert!(parser.parse("logs").is_err());
    }
}
