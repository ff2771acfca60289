use std::collections::HashMap;

use tokenfeed_types::{FeedError, TokenMetadata, normalize_address};

/// Static address → metadata lookup owned by an external collaborator.
pub trait MetadataLookup: Send + Sync {
    /// Metadata for an address, case-insensitive.
    fn get(&self, address: &str) -> Option<TokenMetadata>;
    /// Every known token in load order.
    fn list_all(&self) -> Vec<TokenMetadata>;
    /// Whether the lookup has finished loading.
    fn is_ready(&self) -> bool;
    /// Number of known tokens.
    fn count(&self) -> usize;
}

/// In-memory metadata table loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticMetadata {
    by_address: HashMap<String, TokenMetadata>,
    order: Vec<String>,
}

impl StaticMetadata {
    /// Build from a list of tokens. Later duplicates of an address are ignored.
    pub fn new<I>(tokens: I) -> Self
    where
        I: IntoIterator<Item = TokenMetadata>,
    {
        let mut by_address = HashMap::new();
        let mut order = Vec::new();
        for mut token in tokens {
            let key = normalize_address(&token.address);
            if by_address.contains_key(&key) {
                continue;
            }
            token.address.clone_from(&key);
            order.push(key.clone());
            by_address.insert(key, token);
        }
        Self { by_address, order }
    }

    /// Parse a JSON array of `{address, name, symbol}` objects.
    ///
    /// # Errors
    /// Returns `FeedError::Metadata` when the document is not a valid token list.
    pub fn from_json(json: &str) -> Result<Self, FeedError> {
        let tokens: Vec<TokenMetadata> =
            serde_json::from_str(json).map_err(|e| FeedError::Metadata(e.to_string()))?;
        Ok(Self::new(tokens))
    }
}

impl MetadataLookup for StaticMetadata {
    fn get(&self, address: &str) -> Option<TokenMetadata> {
        self.by_address.get(&normalize_address(address)).cloned()
    }

    fn list_all(&self) -> Vec<TokenMetadata> {
        self.order
            .iter()
            .filter_map(|a| self.by_address.get(a).cloned())
            .collect()
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn count(&self) -> usize {
        self.order.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive_and_ordered() {
        let md = StaticMetadata::new(vec![
            TokenMetadata::new("0xBBB", "Bee", "B"),
            TokenMetadata::new("0xaaa", "Ay", "A"),
            TokenMetadata::new("0xbbb", "Dup", "D"),
        ]);
        assert_eq!(md.count(), 2);
        assert_eq!(md.get("0xbBb").unwrap().name, "Bee");
        let all: Vec<_> = md.list_all().into_iter().map(|t| t.address).collect();
        assert_eq!(all, vec!["0xbbb", "0xaaa"]);
    }

    #[test]
    fn from_json_rejects_garbage() {
        assert!(matches!(
            StaticMetadata::from_json("{not json"),
            Err(FeedError::Metadata(_))
        ));
        let md = StaticMetadata::from_json(r#"[{"address":"0x1","name":"One","symbol":"ONE"}]"#)
            .unwrap();
        assert!(md.is_ready());
        assert!(md.get("0x1").is_some());
    }
}
