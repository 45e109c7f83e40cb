//! Class-name substitution and per-class versions.
//!
//! A [`ClassNameTable`] belongs to exactly one session. Registrations are
//! last-write-wins and only affect records written or read after the call;
//! records already in the stream keep whatever name they were written with.

use std::collections::HashMap;

/// True-name/alias mapping plus the version written for each class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassNameTable {
    encode_aliases: HashMap<String, String>,
    decode_aliases: HashMap<String, String>,
    versions: HashMap<String, u32>,
}

impl ClassNameTable {
    /// Creates a table with no overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes `true_name` into the archive as `alias` from now on.
    pub fn register_alias(&mut self, true_name: impl Into<String>, alias: impl Into<String>) {
        self.encode_aliases.insert(true_name.into(), alias.into());
    }

    /// Decodes records named `alias` as `true_name` from now on.
    pub fn register_decode_alias(&mut self, alias: impl Into<String>, true_name: impl Into<String>) {
        self.decode_aliases.insert(alias.into(), true_name.into());
    }

    /// Overrides the version written for `true_name`.
    pub fn set_version(&mut self, true_name: impl Into<String>, version: u32) {
        self.versions.insert(true_name.into(), version);
    }

    /// The version registered for `true_name`, if any.
    pub fn version(&self, true_name: &str) -> Option<u32> {
        self.versions.get(true_name).copied()
    }

    /// Name to write for `true_name`; identity when no alias is registered.
    pub fn alias_for_encoding<'a>(&'a self, true_name: &'a str) -> &'a str {
        self.encode_aliases
            .get(true_name)
            .map_or(true_name, String::as_str)
    }

    /// Name and version to write for `true_name`.
    ///
    /// Unregistered classes keep their own name and `default_version`, which
    /// is the version the node itself declares (0 unless overridden).
    pub fn resolve_for_encoding<'a>(
        &'a self,
        true_name: &'a str,
        default_version: u32,
    ) -> (&'a str, u32) {
        (
            self.alias_for_encoding(true_name),
            self.version(true_name).unwrap_or(default_version),
        )
    }

    /// True name for a name found in the archive; identity when unregistered.
    pub fn true_name_for_decoding<'a>(&'a self, alias: &'a str) -> &'a str {
        self.decode_aliases.get(alias).map_or(alias, String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_names_map_to_themselves() {
        let table = ClassNameTable::new();
        assert_eq!(table.resolve_for_encoding("Foo", 0), ("Foo", 0));
        assert_eq!(table.resolve_for_encoding("Foo", 2), ("Foo", 2));
        assert_eq!(table.true_name_for_decoding("Foo"), "Foo");
    }

    #[test]
    fn last_registration_wins() {
        let mut table = ClassNameTable::new();
        table.register_alias("Foo", "F1");
        table.register_alias("Foo", "F2");
        table.set_version("Foo", 3);
        assert_eq!(table.resolve_for_encoding("Foo", 1), ("F2", 3));

        table.register_decode_alias("F2", "Foo");
        assert_eq!(table.true_name_for_decoding("F2"), "Foo");
        assert_eq!(table.true_name_for_decoding("F1"), "F1");
    }
}
