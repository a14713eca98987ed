//! Configuration structures for rackhost.
//!
//! This module defines configuration options for various components:
//! - [`RuntimeConfig`]: Top-level configuration containing all settings
//! - [`EngineConfig`]: Wasmtime engine settings (pooling, optimization)
//! - [`ExecutionConfig`]: Per-call execution limits (fuel)
//! - [`FactoryConfig`]: Application factory settings

use serde::{Deserialize, Serialize};

/// Top-level runtime configuration.
///
/// It can be loaded from files (TOML, JSON) via serde.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RuntimeConfig {
    /// Wasmtime engine configuration.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Per-call execution configuration.
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Application factory configuration.
    #[serde(default)]
    pub factory: FactoryConfig,
}

/// Wasmtime engine configuration.
///
/// These settings affect the engine shared by every runtime the factory
/// creates.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Enable pooling allocator for fast instance creation.
    ///
    /// When enabled, memory is pre-allocated for a pool of instances.
    #[serde(default = "defaults::pooling_allocator")]
    pub pooling_allocator: bool,

    /// Maximum concurrent instances in the pool.
    ///
    /// Every runtime holds two instances (adapter and application).
    /// Only effective when `pooling_allocator` is enabled.
    #[serde(default = "defaults::max_instances")]
    pub max_instances: u32,

    /// Memory per instance slot in megabytes.
    #[serde(default = "defaults::instance_memory_mb")]
    pub instance_memory_mb: u32,

    /// Compile with Cranelift's speed optimizations.
    #[serde(default = "defaults::optimize")]
    pub optimize: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pooling_allocator: defaults::pooling_allocator(),
            max_instances: defaults::max_instances(),
            instance_memory_mb: defaults::instance_memory_mb(),
            optimize: defaults::optimize(),
        }
    }
}

/// Per-call execution configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutionConfig {
    /// Maximum fuel (CPU instructions) per call into a runtime.
    ///
    /// Fuel is refilled before application construction and before every
    /// request, so a budget applies to each of them separately.
    #[serde(default = "defaults::max_fuel")]
    pub max_fuel: u64,

    /// Enable fuel metering.
    #[serde(default = "defaults::fuel_metering")]
    pub fuel_metering: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_fuel: defaults::max_fuel(),
            fuel_metering: defaults::fuel_metering(),
        }
    }
}

impl ExecutionConfig {
    /// Fuel to load into a store before a call.
    ///
    /// With metering disabled the store is still charged, so it gets an
    /// effectively unbounded tank.
    pub fn fuel_budget(&self) -> u64 {
        if self.fuel_metering {
            self.max_fuel
        } else {
            u64::MAX
        }
    }
}

/// Application factory configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FactoryConfig {
    /// Name of the host init parameter holding the application descriptor.
    #[serde(default = "defaults::descriptor_parameter")]
    pub descriptor_parameter: String,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            descriptor_parameter: defaults::descriptor_parameter(),
        }
    }
}

/// Default value functions for serde.
mod defaults {
    pub const fn pooling_allocator() -> bool {
        true
    }

    pub const fn max_instances() -> u32 {
        1000
    }

    pub const fn instance_memory_mb() -> u32 {
        64
    }

    pub const fn optimize() -> bool {
        true
    }

    pub const fn max_fuel() -> u64 {
        10_000_000
    }

    pub const fn fuel_metering() -> bool {
        true
    }

    pub fn descriptor_parameter() -> String {
        "rackup".to_string()
    }
}
