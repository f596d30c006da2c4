//! SuffixGenerator port - バケット名のランダムサフィックス
//!
//! バケット名が設定されていない場合、orchestrator は
//! `<prefix><suffix>` という新しい private バケットを作る。
//! テストで決定的な名前を得るために trait にしている。

use rand::Rng;
use rand::distributions::Alphanumeric;

pub const DEFAULT_SUFFIX_LEN: usize = 16;

pub trait SuffixGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// RandomSuffix は英数字 16 文字のサフィックスを生成
#[derive(Debug, Clone, Copy)]
pub struct RandomSuffix {
    len: usize,
}

impl RandomSuffix {
    pub fn new(len: usize) -> Self {
        Self { len }
    }
}

impl Default for RandomSuffix {
    fn default() -> Self {
        Self::new(DEFAULT_SUFFIX_LEN)
    }
}

impl SuffixGenerator for RandomSuffix {
    fn generate(&self) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(self.len)
            .map(char::from)
            // bucket names are case-insensitive on most stores
            .map(|c| c.to_ascii_lowercase())
            .collect()
    }
}

/// FixedSuffix は常に同じサフィックスを返す（テスト用）
#[derive(Debug, Clone)]
pub struct FixedSuffix(pub String);

impl SuffixGenerator for FixedSuffix {
    fn generate(&self) -> String {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_suffix_has_requested_length_and_charset() {
        let suffix = RandomSuffix::default().generate();
        assert_eq!(suffix.len(), DEFAULT_SUFFIX_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn random_suffixes_differ() {
        let generator = RandomSuffix::default();
        assert_ne!(generator.generate(), generator.generate());
    }
}
