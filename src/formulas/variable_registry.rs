use std::collections::{BTreeMap, HashMap};
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU32, Ordering};

use super::{VarType, Variable};

/// Reasons for a registry mutation to fail.
///
/// All of these are recoverable: the caller can query before inserting, or
/// catch the error and choose another name or index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// The index is already mapped to a variable.
    DuplicateIndex(u32),
    /// The name is already mapped to a variable.
    DuplicateName(String),
    /// The target name of a rename or merge is already taken.
    NameConflict(String),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateIndex(index) => write!(f, "variable index {index} is already in use"),
            Self::DuplicateName(name) => write!(f, "variable name '{name}' is already in use"),
            Self::NameConflict(name) => write!(f, "variable name '{name}' is already taken"),
        }
    }
}

impl std::error::Error for RegistryError {}

#[derive(Clone, Debug, PartialEq, Eq)]
struct VariableInfo {
    name: Option<String>,
    var_type: VarType,
}

/// An injective mapping between 1-based variable indices and optionally named,
/// typed variables.
///
/// The registry is the single authority on variable identity: every operation
/// that allocates or resolves indices takes a registry explicitly — there is
/// no ambient instance. Indices are assigned on first use if unspecified and
/// are never reused after removal within the same registry instance.
///
/// Fresh indices can be [reserved](`Self::reserve_variable`) through a shared
/// reference; the counter is atomic, so parallel transformations can allocate
/// auxiliary variables concurrently without duplicate assignment.
///
/// # Examples
///
/// Basic usage:
///
/// ```
/// # use clausify::formulas::{VariableRegistry, VarType};
/// let mut registry = VariableRegistry::new();
///
/// let a = registry.add_variable(Some("a"), None, VarType::Bool).unwrap();
/// assert_eq!(a.index(), 1);
/// assert_eq!(registry.variable("a"), Some(a));
/// assert!(registry.add_variable(Some("a"), None, VarType::Bool).is_err());
/// ```
#[derive(Debug)]
pub struct VariableRegistry {
    variables: BTreeMap<u32, VariableInfo>,
    names: HashMap<String, u32>,
    next_index: AtomicU32,
}

impl Default for VariableRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for VariableRegistry {
    fn clone(&self) -> Self {
        Self {
            variables: self.variables.clone(),
            names: self.names.clone(),
            next_index: AtomicU32::new(self.next_index.load(Ordering::SeqCst)),
        }
    }
}

/// Structural equality over the registered entries. The internal fresh-index
/// counter is not compared, so a registry with reserved-but-unregistered
/// indices still equals its entry-wise clone.
impl PartialEq for VariableRegistry {
    fn eq(&self, other: &Self) -> bool {
        self.variables == other.variables
    }
}

impl Eq for VariableRegistry {}

impl VariableRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self { variables: BTreeMap::new(), names: HashMap::new(), next_index: AtomicU32::new(1) }
    }

    /// Creates a registry containing one boolean variable per name, indexed in
    /// iteration order starting at 1.
    pub fn with_variables<I, S>(names: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = Self::new();
        for name in names {
            registry.add_variable(Some(name.as_ref()), None, VarType::Bool)?;
        }
        Ok(registry)
    }

    /// Adds a variable to this registry and returns its handle.
    ///
    /// When `index` is unspecified, the next free index is assigned
    /// automatically. Fails with [`DuplicateIndex`](`RegistryError::DuplicateIndex`)
    /// or [`DuplicateName`](`RegistryError::DuplicateName`) if either collides
    /// with an existing entry.
    ///
    /// # Panics
    ///
    /// Panics if an explicit index of `0` is passed — indices are 1-based.
    pub fn add_variable(
        &mut self,
        name: Option<&str>,
        index: Option<u32>,
        var_type: VarType,
    ) -> Result<Variable, RegistryError> {
        if let Some(name) = name {
            if self.names.contains_key(name) {
                return Err(RegistryError::DuplicateName(name.to_string()));
            }
        }
        let index = match index {
            Some(index) => {
                assert_ne!(index, 0, "variable indices are 1-based");
                if self.variables.contains_key(&index) {
                    return Err(RegistryError::DuplicateIndex(index));
                }
                let next = self.next_index.get_mut();
                if index >= *next {
                    *next = index + 1;
                }
                index
            }
            None => {
                let next = self.next_index.get_mut();
                let index = *next;
                *next += 1;
                index
            }
        };
        if let Some(name) = name {
            self.names.insert(name.to_string(), index);
        }
        self.variables.insert(index, VariableInfo { name: name.map(String::from), var_type });
        Ok(Variable::from_index(index).expect("registry indices start at 1"))
    }

    /// Reserves a fresh index through a shared reference and returns the
    /// variable handle, without registering an entry.
    ///
    /// The counter is atomic, so concurrent reservations never collide. A
    /// reserved index is permanently consumed: registering it later (with
    /// [`add_variable`](`Self::add_variable`)) is optional, but it will not be
    /// handed out again either way.
    pub fn reserve_variable(&self) -> Variable {
        let index = self.next_index.fetch_add(1, Ordering::SeqCst);
        Variable::from_index(index).expect("registry indices start at 1")
    }

    /// Returns the variable with the given name.
    pub fn variable(&self, name: &str) -> Option<Variable> {
        self.names.get(name).map(|&index| {
            Variable::from_index(index).expect("registry indices start at 1")
        })
    }

    /// Returns the variable with the given index.
    pub fn variable_at(&self, index: u32) -> Option<Variable> {
        self.variables.contains_key(&index).then(|| {
            Variable::from_index(index).expect("registry indices start at 1")
        })
    }

    /// Returns the variable with the given name, if it has the given type.
    pub fn variable_with_type(&self, name: &str, var_type: VarType) -> Option<Variable> {
        self.variable(name).filter(|v| self.var_type_of(*v) == Some(var_type))
    }

    /// Returns the variable with the given index, if it has the given type.
    pub fn variable_at_with_type(&self, index: u32, var_type: VarType) -> Option<Variable> {
        self.variable_at(index).filter(|v| self.var_type_of(*v) == Some(var_type))
    }

    /// Returns the name of the given variable, if it is registered and named.
    pub fn name_of(&self, variable: Variable) -> Option<&str> {
        self.variables.get(&variable.index()).and_then(|info| info.name.as_deref())
    }

    /// Returns the type of the given variable, if it is registered.
    pub fn var_type_of(&self, variable: Variable) -> Option<VarType> {
        self.variables.get(&variable.index()).map(|info| info.var_type)
    }

    /// Removes the variable with the given name. Returns whether an entry was
    /// removed. Removal does not compact the remaining indices, and the freed
    /// index is not reused.
    pub fn remove_variable(&mut self, name: &str) -> bool {
        self.names.remove(name).is_some_and(|index| self.variables.remove(&index).is_some())
    }

    /// Removes the variable with the given index. Returns whether an entry was
    /// removed.
    pub fn remove_variable_at(&mut self, index: u32) -> bool {
        self.variables.remove(&index).inspect(|info| {
            if let Some(name) = &info.name {
                self.names.remove(name);
            }
        }).is_some()
    }

    /// Renames a variable without changing its identity. Returns `Ok(false)`
    /// if no variable is named `old`, and fails with
    /// [`NameConflict`](`RegistryError::NameConflict`) if `new` is already
    /// taken.
    pub fn rename_variable(&mut self, old: &str, new: &str) -> Result<bool, RegistryError> {
        if old == new {
            return Ok(self.names.contains_key(old));
        }
        if self.names.contains_key(new) {
            return Err(RegistryError::NameConflict(new.to_string()));
        }
        let Some(index) = self.names.remove(old) else {
            return Ok(false);
        };
        self.names.insert(new.to_string(), index);
        self.variables.get_mut(&index).expect("names map entries are registered").name =
            Some(new.to_string());
        Ok(true)
    }

    /// Renames the variable with the given index. Returns `Ok(false)` if the
    /// index is not registered, and fails with
    /// [`NameConflict`](`RegistryError::NameConflict`) if `new` is already
    /// taken by another variable.
    pub fn rename_variable_at(&mut self, index: u32, new: &str) -> Result<bool, RegistryError> {
        match self.names.get(new) {
            Some(&existing) if existing == index => return Ok(true),
            Some(_) => return Err(RegistryError::NameConflict(new.to_string())),
            None => {}
        }
        let Some(info) = self.variables.get_mut(&index) else {
            return Ok(false);
        };
        if let Some(old) = info.name.replace(new.to_string()) {
            self.names.remove(&old);
        }
        self.names.insert(new.to_string(), index);
        Ok(true)
    }

    /// Renumbers all entries to a dense `1..=N` range, preserving their
    /// relative order.
    ///
    /// Any externally held [`Variable`] or literal becomes stale and must be
    /// re-resolved through the registry (by name) afterwards.
    #[allow(clippy::cast_possible_truncation)]
    pub fn normalize(&mut self) {
        let entries = std::mem::take(&mut self.variables);
        self.names.clear();
        for (new_index, (_, info)) in (1..).zip(entries) {
            if let Some(name) = &info.name {
                self.names.insert(name.clone(), new_index);
            }
            self.variables.insert(new_index, info);
        }
        *self.next_index.get_mut() = self.variables.len() as u32 + 1;
    }

    /// Merges this registry with another one into a new registry, unioning
    /// variables by name; neither input is mutated.
    ///
    /// The result keeps the left operand's indices. Entries of the right
    /// operand are inserted in ascending index order: a named entry whose name
    /// is already present is unified with it, every other entry keeps its
    /// original index when that index is still free and receives the next free
    /// one otherwise. Merging with an empty registry therefore yields a
    /// structural clone, and merging is commutative up to renumbering.
    ///
    /// Fails with [`NameConflict`](`RegistryError::NameConflict`) if both
    /// registries contain the same name with different value types.
    pub fn merge(&self, other: &Self) -> Result<Self, RegistryError> {
        let mut result = self.clone();
        for (&index, info) in &other.variables {
            if let Some(name) = &info.name {
                if let Some(existing) = result.variable(name) {
                    if result.var_type_of(existing) == Some(info.var_type) {
                        continue;
                    }
                    return Err(RegistryError::NameConflict(name.clone()));
                }
            }
            let target = if result.variables.contains_key(&index) { None } else { Some(index) };
            result.add_variable(info.name.as_deref(), target, info.var_type)?;
        }
        Ok(result)
    }

    /// Merges any number of registries, left to right.
    pub fn merge_all<'a, I>(registries: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = &'a Self>,
    {
        registries.into_iter().try_fold(Self::new(), |acc, registry| acc.merge(registry))
    }

    /// Returns all registered variables in ascending index order.
    pub fn variables(&self) -> impl Iterator<Item = Variable> + '_ {
        self.variables.keys().map(|&index| {
            Variable::from_index(index).expect("registry indices start at 1")
        })
    }

    /// Returns the number of registered variables.
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Returns `true` if no variable is registered.
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Returns the highest registered index, or 0 for an empty registry.
    pub fn maximum_index(&self) -> u32 {
        self.variables.keys().next_back().copied().unwrap_or(0)
    }
}
