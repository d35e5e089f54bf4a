//! Tree-scoped symbol namespace.
//!
//! Every symbol is owned by a node (or load group) and addressed by a local key.
//! The name handed to the algebra backend is synthesized as `<owner>_<key>` and
//! interned in a [`symbios::SymbolTable`], whose id becomes the symbol's identity.

use crate::error::{ModelError, ModelResult};
use crate::expr::{Symbol, SymbolKind};
use std::collections::HashMap;
use symbios::SymbolTable;

/// Synthesizes the backend-visible name of an owner-scoped quantity.
pub fn synthesize_name(owner: &str, key: &str) -> String {
    format!("{owner}_{key}")
}

/// One registry entry.
#[derive(Clone, Debug)]
pub struct SymbolEntry {
    pub owner: String,
    pub key: String,
    pub symbol: Symbol,
    pub description: String,
}

/// Store of every symbol created in a model tree.
pub struct SymbolRegistry {
    interner: SymbolTable,
    entries: Vec<SymbolEntry>,
    by_key: HashMap<(String, String), usize>,
    by_id: HashMap<u16, usize>,
}

impl Default for SymbolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolRegistry {
    pub fn new() -> Self {
        Self {
            interner: SymbolTable::new(),
            entries: Vec::new(),
            by_key: HashMap::new(),
            by_id: HashMap::new(),
        }
    }

    /// Returns the symbol of `owner` under `key`, creating it on first request.
    ///
    /// A second request for the same `(owner, key)` returns the cached symbol;
    /// `description` and `kind` of the later request are ignored. Fails with
    /// [`ModelError::NameCollision`] when the synthesized name already belongs to
    /// another `(owner, key)` pair (e.g. owner `a_b` key `c` against owner `a`
    /// key `b_c`).
    pub fn get_or_create(
        &mut self,
        owner: &str,
        key: &str,
        description: &str,
        kind: SymbolKind,
    ) -> ModelResult<Symbol> {
        if let Some(&idx) = self.by_key.get(&(owner.to_string(), key.to_string())) {
            return Ok(self.entries[idx].symbol.clone());
        }

        let name = synthesize_name(owner, key);
        let id = match self.interner.resolve_id(&name) {
            Some(id) if self.by_id.contains_key(&id) => {
                return Err(ModelError::NameCollision { name });
            }
            // Interned by a stage that was rolled back.
            Some(id) => id,
            None => self
                .interner
                .intern(&name)
                .map_err(|_| ModelError::SymbolTable { name: name.clone() })?,
        };

        let symbol = Symbol::new(id, name, kind);
        log::trace!("created symbol {symbol} ({kind:?})");
        let idx = self.entries.len();
        self.entries.push(SymbolEntry {
            owner: owner.to_string(),
            key: key.to_string(),
            symbol: symbol.clone(),
            description: description.to_string(),
        });
        self.by_key.insert((owner.to_string(), key.to_string()), idx);
        self.by_id.insert(id, idx);
        Ok(symbol)
    }

    /// Looks up an existing symbol without creating it.
    pub fn get(&self, owner: &str, key: &str) -> ModelResult<Symbol> {
        self.by_key
            .get(&(owner.to_string(), key.to_string()))
            .map(|&idx| self.entries[idx].symbol.clone())
            .ok_or_else(|| {
                ModelError::lookup(format!("no symbol '{key}' has been created for '{owner}'"))
            })
    }

    /// Description recorded when `symbol` was created.
    pub fn describe(&self, symbol: &Symbol) -> ModelResult<&str> {
        self.entry(symbol).map(|e| e.description.as_str())
    }

    /// Full entry of `symbol`.
    pub fn entry(&self, symbol: &Symbol) -> ModelResult<&SymbolEntry> {
        self.by_id
            .get(&symbol.id())
            .map(|&idx| &self.entries[idx])
            .filter(|e| e.symbol == *symbol)
            .ok_or_else(|| {
                ModelError::lookup(format!("symbol '{symbol}' is not registered in this tree"))
            })
    }

    /// Entries in creation order.
    pub fn entries(&self) -> &[SymbolEntry] {
        &self.entries
    }

    /// Symbols created for `owner`, in creation order.
    pub fn owned_by<'a>(&'a self, owner: &'a str) -> impl Iterator<Item = &'a Symbol> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.owner == owner)
            .map(|e| &e.symbol)
    }

    /// Forgets every entry created after the first `len`.
    ///
    /// Names stay interned, so a later request for the same `(owner, key)`
    /// gets the same id back.
    pub(crate) fn truncate(&mut self, len: usize) {
        for entry in self.entries.drain(len..) {
            self.by_key.remove(&(entry.owner, entry.key));
            self.by_id.remove(&entry.symbol.id());
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
