//! Wire-token enum conversion.
//!
//! Converts string or integer tokens from the wire into typed enum values at
//! the deserialization boundary. A type either registers one designated
//! factory function, or falls back to generic matching over its declared
//! variants (exact name, then ordinal index).
//!
//! Resolution happens once per type and is cached for the process lifetime;
//! registering more than one factory for a type is a configuration fault
//! that surfaces at the first conversion attempt for that type, never at
//! registration.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use crate::error::ServiceError;

/// Enum types convertible from wire tokens.
///
/// `VARIANTS` must list the constants in declaration order; the ordinal
/// fallback indexes into it directly.
pub trait WireEnum: Copy + Send + Sync + 'static {
    /// Declared constants, in declaration order.
    const VARIANTS: &'static [Self];

    /// Declared constant name, matched case-sensitively.
    fn name(&self) -> &'static str;
}

/// Token-to-value conversion failures. Client-error class.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    #[error("no variant of {type_name} matches `{token}`")]
    NoMatch {
        type_name: &'static str,
        token: String,
    },
    #[error("ordinal {ordinal} out of range for {type_name} ({len} variants)")]
    OutOfRange {
        type_name: &'static str,
        ordinal: i64,
        len: usize,
    },
    /// A registered factory rejected the token.
    #[error("{0}")]
    Factory(String),
}

/// Registry misconfiguration. Fatal, fail-fast at first use.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error(
        "{count} factories registered for {type_name}, at most one designated factory is allowed"
    )]
    AmbiguousFactory {
        type_name: &'static str,
        count: usize,
    },
}

type BoxedFactory =
    Arc<dyn Fn(&str) -> Result<Box<dyn Any + Send>, ConvertError> + Send + Sync>;

/// Per-type conversion strategy, resolved once.
#[derive(Clone)]
enum Strategy {
    /// Delegate every conversion to the registered factory.
    Factory(BoxedFactory),
    /// Name match, then ordinal index.
    Generic,
}

/// Process-lifetime converter registry.
///
/// The resolved cache is populate-once: concurrent first access may race,
/// but the compute is idempotent (both racers derive the same entry from the
/// same registrations) so whichever entry lands is equivalent. Entries are
/// never evicted.
#[derive(Default)]
pub struct EnumRegistry {
    factories: RwLock<HashMap<TypeId, Vec<BoxedFactory>>>,
    resolved: RwLock<HashMap<TypeId, Arc<Result<Strategy, ConfigError>>>>,
}

impl EnumRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the designated factory for `T`.
    ///
    /// Registrations are accepted unconditionally; ambiguity (a second
    /// registration for the same type) is detected at the first conversion
    /// attempt for that type.
    pub fn register_factory<T, F>(&self, factory: F)
    where
        T: WireEnum,
        F: Fn(&str) -> Result<T, ConvertError> + Send + Sync + 'static,
    {
        let boxed: BoxedFactory =
            Arc::new(move |token| factory(token).map(|v| Box::new(v) as Box<dyn Any + Send>));
        self.factories
            .write()
            .expect("factory registrations poisoned")
            .entry(TypeId::of::<T>())
            .or_default()
            .push(boxed);
    }

    /// Convert a string token.
    ///
    /// The empty string always converts to `None` (explicit reset
    /// semantics), for every type, before any factory runs.
    pub fn convert_str<T: WireEnum>(&self, token: &str) -> Result<Option<T>, ServiceError> {
        if token.is_empty() {
            return Ok(None);
        }
        match self.strategy::<T>()? {
            Strategy::Factory(factory) => Ok(Some(Self::call_factory::<T>(&factory, token)?)),
            Strategy::Generic => {
                for variant in T::VARIANTS {
                    if variant.name() == token {
                        return Ok(Some(*variant));
                    }
                }
                let ordinal: i64 = token.parse().map_err(|_| ConvertError::NoMatch {
                    type_name: type_name::<T>(),
                    token: token.to_owned(),
                })?;
                Ok(Some(Self::by_ordinal::<T>(ordinal)?))
            }
        }
    }

    /// Convert an integer token by declared-order ordinal.
    pub fn convert_int<T: WireEnum>(&self, ordinal: i64) -> Result<T, ServiceError> {
        match self.strategy::<T>()? {
            // factories take the decimal string form of the token
            Strategy::Factory(factory) => {
                Self::call_factory::<T>(&factory, &ordinal.to_string())
            }
            Strategy::Generic => Ok(Self::by_ordinal::<T>(ordinal)?),
        }
    }

    fn by_ordinal<T: WireEnum>(ordinal: i64) -> Result<T, ConvertError> {
        let out_of_range = || ConvertError::OutOfRange {
            type_name: type_name::<T>(),
            ordinal,
            len: T::VARIANTS.len(),
        };
        let index = usize::try_from(ordinal).map_err(|_| out_of_range())?;
        T::VARIANTS.get(index).copied().ok_or_else(out_of_range)
    }

    fn call_factory<T: WireEnum>(
        factory: &BoxedFactory,
        token: &str,
    ) -> Result<T, ServiceError> {
        let value = factory(token)?;
        match value.downcast::<T>() {
            Ok(value) => Ok(*value),
            // unreachable for factories registered through register_factory
            Err(_) => Err(ServiceError::Internal(format!(
                "factory for {} produced a mismatched type",
                type_name::<T>()
            ))),
        }
    }

    /// Resolve and cache the strategy for `T`.
    fn strategy<T: WireEnum>(&self) -> Result<Strategy, ServiceError> {
        let key = TypeId::of::<T>();
        if let Some(entry) = self
            .resolved
            .read()
            .expect("resolved cache poisoned")
            .get(&key)
        {
            return Self::unpack::<T>(entry);
        }

        let computed = {
            let factories = self.factories.read().expect("factory registrations poisoned");
            match factories.get(&key).map(Vec::as_slice) {
                None | Some([]) => Ok(Strategy::Generic),
                Some([factory]) => Ok(Strategy::Factory(Arc::clone(factory))),
                Some(many) => Err(ConfigError::AmbiguousFactory {
                    type_name: type_name::<T>(),
                    count: many.len(),
                }),
            }
        };

        let mut resolved = self.resolved.write().expect("resolved cache poisoned");
        let entry = resolved
            .entry(key)
            .or_insert_with(|| Arc::new(computed))
            .clone();
        drop(resolved);
        Self::unpack::<T>(&entry)
    }

    fn unpack<T: WireEnum>(
        entry: &Arc<Result<Strategy, ConfigError>>,
    ) -> Result<Strategy, ServiceError> {
        match entry.as_ref() {
            Ok(strategy) => Ok(strategy.clone()),
            Err(config) => Err(ServiceError::Configuration(config.clone())),
        }
    }
}

impl std::fmt::Debug for EnumRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let factories = self.factories.read().expect("factory registrations poisoned");
        let resolved = self.resolved.read().expect("resolved cache poisoned");
        f.debug_struct("EnumRegistry")
            .field("registered_types", &factories.len())
            .field("resolved_types", &resolved.len())
            .finish()
    }
}
