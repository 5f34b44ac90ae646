//! Typed per-environment scratch state shared between terms.
//!
//! A term that owns a piece of cross-term state declares a [`ScratchKey`]
//! constant next to itself. Other terms read the entry through the same key.
//! Entries are created lazily, so readers observe zeros until the owner first
//! writes. [`Extras::reset`] clears entries for the environments being reset
//! according to each key's [`ScratchReset`] policy.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::marker::PhantomData;

use ndarray::Array1;

use crate::env_ids::EnvIds;
use crate::error::EvalError;

/// One scratch column, as stored and as reported in step info.
#[derive(Debug, Clone, PartialEq)]
pub enum ScratchValue {
    F32(Array1<f32>),
    I64(Array1<i64>),
    Bool(Array1<bool>),
}

impl ScratchValue {
    fn type_name(&self) -> &'static str {
        match self {
            ScratchValue::F32(_) => "f32",
            ScratchValue::I64(_) => "i64",
            ScratchValue::Bool(_) => "bool",
        }
    }

    fn len(&self) -> usize {
        match self {
            ScratchValue::F32(a) => a.len(),
            ScratchValue::I64(a) => a.len(),
            ScratchValue::Bool(a) => a.len(),
        }
    }

    fn zero_rows(&mut self, env_ids: &EnvIds) {
        match self {
            ScratchValue::F32(a) => env_ids.iter().for_each(|i| a[i] = 0.0),
            ScratchValue::I64(a) => env_ids.iter().for_each(|i| a[i] = 0),
            ScratchValue::Bool(a) => env_ids.iter().for_each(|i| a[i] = false),
        }
    }
}

/// Element types a scratch entry can hold.
pub trait ScratchElement: Copy + Default + PartialEq + Debug + 'static {
    const TYPE_NAME: &'static str;

    fn wrap(values: Array1<Self>) -> ScratchValue;
    fn unwrap_ref(value: &ScratchValue) -> Option<&Array1<Self>>;
    fn unwrap_mut(value: &mut ScratchValue) -> Option<&mut Array1<Self>>;
}

macro_rules! scratch_element {
    ($ty:ty, $variant:ident, $name:literal) => {
        impl ScratchElement for $ty {
            const TYPE_NAME: &'static str = $name;

            fn wrap(values: Array1<Self>) -> ScratchValue {
                ScratchValue::$variant(values)
            }

            fn unwrap_ref(value: &ScratchValue) -> Option<&Array1<Self>> {
                match value {
                    ScratchValue::$variant(a) => Some(a),
                    _ => None,
                }
            }

            fn unwrap_mut(value: &mut ScratchValue) -> Option<&mut Array1<Self>> {
                match value {
                    ScratchValue::$variant(a) => Some(a),
                    _ => None,
                }
            }
        }
    };
}

scratch_element!(f32, F32, "f32");
scratch_element!(i64, I64, "i64");
scratch_element!(bool, Bool, "bool");

/// What happens to an entry when environments reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScratchReset {
    /// Rows of reset environments are zeroed.
    Zero,
    /// The owning term reassigns rows itself (typically from a reset event).
    Owner,
}

/// Typed handle to a scratch entry.
#[derive(Debug, Clone)]
pub struct ScratchKey<T> {
    name: Cow<'static, str>,
    reset: ScratchReset,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ScratchKey<T> {
    pub const fn new(name: &'static str, reset: ScratchReset) -> Self {
        Self {
            name: Cow::Borrowed(name),
            reset,
            _marker: PhantomData,
        }
    }

    /// Key with a runtime-chosen name.
    pub fn named(name: impl Into<String>, reset: ScratchReset) -> Self {
        Self {
            name: Cow::Owned(name.into()),
            reset,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reset_policy(&self) -> ScratchReset {
        self.reset
    }
}

#[derive(Debug, Clone)]
struct ScratchEntry {
    value: ScratchValue,
    reset: ScratchReset,
}

/// Scratch store owned by the environment context.
#[derive(Debug, Clone)]
pub struct Extras {
    num_envs: usize,
    entries: BTreeMap<String, ScratchEntry>,
}

impl Extras {
    pub fn new(num_envs: usize) -> Self {
        Self {
            num_envs,
            entries: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// The entry, if it has been created.
    pub fn get<T: ScratchElement>(
        &self,
        key: &ScratchKey<T>,
    ) -> Result<Option<&Array1<T>>, EvalError> {
        match self.entries.get(key.name()) {
            None => Ok(None),
            Some(entry) => T::unwrap_ref(&entry.value)
                .map(Some)
                .ok_or_else(|| type_error::<T>(key.name(), &entry.value)),
        }
    }

    /// The entry, or zeros if nothing has written it yet.
    pub fn read<T: ScratchElement>(
        &self,
        key: &ScratchKey<T>,
    ) -> Result<Cow<'_, Array1<T>>, EvalError> {
        Ok(match self.get(key)? {
            Some(values) => Cow::Borrowed(values),
            None => Cow::Owned(Array1::from_elem(self.num_envs, T::default())),
        })
    }

    /// Mutable access, creating a zeroed entry on first use.
    pub fn get_or_insert<T: ScratchElement>(
        &mut self,
        key: &ScratchKey<T>,
    ) -> Result<&mut Array1<T>, EvalError> {
        let num_envs = self.num_envs;
        let entry = self
            .entries
            .entry(key.name().to_string())
            .or_insert_with(|| ScratchEntry {
                value: T::wrap(Array1::from_elem(num_envs, T::default())),
                reset: key.reset_policy(),
            });
        let actual = entry.value.type_name();
        T::unwrap_mut(&mut entry.value).ok_or_else(|| EvalError::ScratchType {
            key: key.name().to_string(),
            expected: T::TYPE_NAME,
            actual,
        })
    }

    /// Clear rows of reset environments for entries with [`ScratchReset::Zero`].
    pub fn reset(&mut self, env_ids: &EnvIds) {
        for entry in self.entries.values_mut() {
            if entry.reset == ScratchReset::Zero {
                debug_assert_eq!(entry.value.len(), self.num_envs);
                entry.value.zero_rows(env_ids);
            }
        }
    }

    /// Copy of every entry, keyed by name.
    pub fn snapshot(&self) -> BTreeMap<String, ScratchValue> {
        self.entries
            .iter()
            .map(|(k, e)| (k.clone(), e.value.clone()))
            .collect()
    }
}

fn type_error<T: ScratchElement>(key: &str, value: &ScratchValue) -> EvalError {
    EvalError::ScratchType {
        key: key.to_string(),
        expected: T::TYPE_NAME,
        actual: value.type_name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHOICE: ScratchKey<i64> = ScratchKey::new("choice", ScratchReset::Owner);
    const COUNTER: ScratchKey<f32> = ScratchKey::new("counter", ScratchReset::Zero);

    #[test]
    fn readers_see_zeros_before_first_write() {
        let extras = Extras::new(4);
        assert_eq!(extras.read(&CHOICE).unwrap().to_vec(), vec![0; 4]);
        assert!(!extras.contains("choice"));
    }

    #[test]
    fn reset_zeroes_only_selected_rows_of_zero_entries() {
        let mut extras = Extras::new(3);
        extras.get_or_insert(&COUNTER).unwrap().fill(2.0);
        extras.get_or_insert(&CHOICE).unwrap().fill(1);
        extras.reset(&EnvIds::from_indices(3, &[1]));
        assert_eq!(extras.read(&COUNTER).unwrap().to_vec(), vec![2.0, 0.0, 2.0]);
        assert_eq!(extras.read(&CHOICE).unwrap().to_vec(), vec![1, 1, 1]);
    }

    #[test]
    fn type_mismatch_is_reported() {
        let mut extras = Extras::new(2);
        extras.get_or_insert(&COUNTER).unwrap();
        let wrong: ScratchKey<bool> = ScratchKey::named("counter", ScratchReset::Zero);
        let err = extras.get(&wrong).unwrap_err();
        assert_eq!(
            err,
            EvalError::ScratchType {
                key: "counter".into(),
                expected: "bool",
                actual: "f32"
            }
        );
    }

    #[test]
    fn snapshot_copies_values() {
        let mut extras = Extras::new(2);
        extras.get_or_insert(&CHOICE).unwrap()[1] = 1;
        let snap = extras.snapshot();
        assert_eq!(snap["choice"], ScratchValue::I64(ndarray::array![0, 1]));
    }
}
