use std::{borrow::Borrow, fmt};

/// Stable name of a message type, e.g. `consul.pbservice.Upstream`.
///
/// Unlike [`std::any::TypeId`] the name survives recompilation, so it can be
/// written into logs or carried next to encoded bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeIdentity(&'static str);

impl TypeIdentity {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub const fn name(&self) -> &'static str {
        self.0
    }

    /// Everything before the last `.`, empty for an unqualified name.
    pub fn package(&self) -> &'static str {
        match self.0.rfind('.') {
            Some(index) => &self.0[..index],
            None => "",
        }
    }

    pub fn short_name(&self) -> &'static str {
        match self.0.rfind('.') {
            Some(index) => &self.0[index + 1..],
            None => self.0,
        }
    }

    /// A name is well formed when every dot separated segment is a non-empty
    /// identifier starting with a letter or `_`.
    pub fn is_well_formed(&self) -> bool {
        !self.0.is_empty()
            && self.0.split('.').all(|segment| {
                let mut chars = segment.chars();
                matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            })
    }
}

impl fmt::Display for TypeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

// Hash and Eq are derived from the inner `&str`, so map lookups by plain name work.
impl Borrow<str> for TypeIdentity {
    fn borrow(&self) -> &str {
        self.0
    }
}

#[cfg(test)]
mod test {
    use super::TypeIdentity;
    use std::collections::HashMap;

    #[test]
    fn test_segments() {
        let identity = TypeIdentity::new("consul.pbservice.Upstream");
        assert_eq!(identity.package(), "consul.pbservice");
        assert_eq!(identity.short_name(), "Upstream");

        let bare = TypeIdentity::new("Weights");
        assert_eq!(bare.package(), "");
        assert_eq!(bare.short_name(), "Weights");
    }

    #[test]
    fn test_well_formed() {
        assert!(TypeIdentity::new("consul.pbservice.Upstream").is_well_formed());
        assert!(TypeIdentity::new("_private.V2").is_well_formed());
        assert!(!TypeIdentity::new("").is_well_formed());
        assert!(!TypeIdentity::new("consul..Upstream").is_well_formed());
        assert!(!TypeIdentity::new("consul.2fast").is_well_formed());
        assert!(!TypeIdentity::new("consul.pb-service").is_well_formed());
    }

    #[test]
    fn test_lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(TypeIdentity::new("a.B"), 1);
        assert_eq!(map.get("a.B"), Some(&1));
        assert_eq!(map.get("a.C"), None);
    }
}
