use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::{
    aggregation::{
        AggregateImpl, AggregationDefinition, AggregationError, ApproxCountImpl, AvgImpl,
        CountDistinctImpl, CountImpl, SumImpl,
    },
    config::RegistryConfig,
    types::{TypeManager, BUILTIN_TYPES},
};

/// Case-insensitive catalog of validated aggregations, shared by every query that names them.
#[derive(Debug, Default)]
pub struct AggregationRegistry {
    by_name: IndexMap<String, Arc<AggregationDefinition>>,
    config: RegistryConfig,
}

impl AggregationRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self { by_name: IndexMap::new(), config }
    }

    pub fn from_config(config: RegistryConfig, types: &dyn TypeManager) -> Result<Self, AggregationError> {
        let register_builtins = config.register_builtins;
        let mut registry = Self::new(config);
        if register_builtins {
            registry.register_impl(&CountImpl, types)?;
            registry.register_impl(&SumImpl, types)?;
            registry.register_impl(&AvgImpl, types)?;
            registry.register_impl(&ApproxCountImpl, types)?;
            registry.register_impl(&CountDistinctImpl, types)?;
        }
        Ok(registry)
    }

    /// Built-ins resolved against the built-in type catalog.
    pub fn default_registry() -> Result<Self, AggregationError> {
        Self::from_config(RegistryConfig::default(), &*BUILTIN_TYPES)
    }

    pub fn register(&mut self, definition: AggregationDefinition) -> Result<Arc<AggregationDefinition>, AggregationError> {
        let key = definition.name().to_ascii_lowercase();
        if self.by_name.contains_key(&key) {
            if !self.config.allow_replacement {
                return Err(AggregationError::Configuration(format!("aggregation {} is already registered", key)));
            }
            warn!(name = %key, "replacing registered aggregation");
        }
        let definition = Arc::new(definition);
        self.by_name.insert(key.clone(), definition.clone());
        debug!(name = %key, approximate = definition.is_approximate(), "registered aggregation");
        Ok(definition)
    }

    pub fn register_impl(&mut self, impl_: &dyn AggregateImpl, types: &dyn TypeManager) -> Result<Arc<AggregationDefinition>, AggregationError> {
        self.register(impl_.definition(types)?)
    }

    pub fn get(&self, name: &str) -> Option<Arc<AggregationDefinition>> {
        self.by_name.get(&name.to_ascii_lowercase()).cloned()
    }

    pub fn list(&self) -> Vec<String> {
        let mut v: Vec<_> = self.by_name.keys().cloned().collect();
        v.sort();
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        aggregation::{OutputFunction, MergeStrategy, ParameterRole},
        types::{SqlType, TypeRegistry, BIGINT, DOUBLE},
    };

    #[test]
    fn registry_contains_all_and_lookup_is_case_insensitive() {
        let r = AggregationRegistry::default_registry().unwrap();
        assert_eq!(r.list(), vec!["approx_count", "avg", "count", "count_distinct", "sum"]);

        assert!(r.get("COUNT").is_some());
        assert!(r.get("sUm").is_some());
        assert!(r.get("Avg").is_some());
        assert!(r.get("median").is_none());
    }

    #[test]
    fn builtin_contracts() {
        let r = AggregationRegistry::default_registry().unwrap();

        let sum = r.get("sum").unwrap();
        assert_eq!(sum.output_type(), &SqlType::simple(BIGINT));
        assert!(matches!(sum.merge_strategy(), MergeStrategy::Combine(_)));

        let avg = r.get("avg").unwrap();
        assert_eq!(avg.output_type(), &SqlType::simple(DOUBLE));

        let count = r.get("count").unwrap();
        let roles: Vec<_> = count.input_parameters().iter().map(|p| p.role()).collect();
        assert_eq!(roles, vec![ParameterRole::State, ParameterRole::NullableInputChannel, ParameterRole::BlockIndex]);

        let approx = r.get("approx_count").unwrap();
        assert!(approx.is_approximate());
        assert!(matches!(approx.output(), OutputFunction::Approximate(_)));

        let distinct = r.get("count_distinct").unwrap();
        assert!(distinct.combine_function().is_none());
        assert!(distinct.intermediate_input_function().is_some());
    }

    #[test]
    fn duplicate_names_follow_config() {
        let types = TypeRegistry::with_builtins();

        let mut strict = AggregationRegistry::from_config(RegistryConfig::default(), &types).unwrap();
        let err = strict.register_impl(&SumImpl, &types).unwrap_err();
        assert_eq!(err, AggregationError::Configuration("aggregation sum is already registered".into()));

        let mut relaxed = AggregationRegistry::from_config(RegistryConfig::replaceable(), &types).unwrap();
        let before = relaxed.get("sum").unwrap();
        let after = relaxed.register_impl(&SumImpl, &types).unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert!(Arc::ptr_eq(&relaxed.get("SUM").unwrap(), &after));
    }

    #[test]
    fn empty_config_skips_builtins() {
        let types = TypeRegistry::with_builtins();
        let mut r = AggregationRegistry::from_config(RegistryConfig::empty(), &types).unwrap();
        assert!(r.list().is_empty());
        r.register_impl(&CountImpl, &types).unwrap();
        assert_eq!(r.list(), vec!["count"]);
    }

    #[test]
    fn builtins_fail_against_a_catalog_without_their_types() {
        let err = AggregationRegistry::from_config(RegistryConfig::default(), &TypeRegistry::new()).unwrap_err();
        assert_eq!(err, AggregationError::UnknownType("bigint".into()));
    }
}
