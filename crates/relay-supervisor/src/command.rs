//! Worker command-line construction.
//!
//! The worker executable is launched with a `router-serve` subcommand
//! and repeated flags built deterministically from the launch spec, so
//! a restart reproduces the original invocation exactly.

use relay_registry::LaunchSpec;

/// Build the worker's argument list from its launch spec.
///
/// Argument order is fixed: providers, endpoints, credential, port,
/// host, default priorities, then the optional network overrides.
pub fn worker_args(spec: &LaunchSpec) -> Vec<String> {
    let mut args = vec!["router-serve".to_string()];

    for provider in &spec.providers {
        args.push("--add-provider".to_string());
        args.push(format!("{},{}", provider.address, provider.priority));
    }

    for endpoint in &spec.endpoints {
        args.push("--add-endpoint".to_string());
        args.push(endpoint.clone());
    }

    if let Some(key) = &spec.key {
        args.push("--key".to_string());
        args.push(key.clone());
    }

    args.push("--port".to_string());
    args.push(spec.port.to_string());
    args.push("--host".to_string());
    args.push(spec.host.clone());
    args.push("--default-provider-priority".to_string());
    args.push(spec.default_provider_priority.to_string());
    args.push("--default-endpoint-priority".to_string());
    args.push(spec.default_endpoint_priority.to_string());

    if let Some(rpc) = &spec.rpc_endpoint {
        args.push("--rpc".to_string());
        args.push(rpc.clone());
    }
    if let Some(ledger) = &spec.ledger_contract {
        args.push("--ledger-ca".to_string());
        args.push(ledger.clone());
    }
    if let Some(inference) = &spec.inference_contract {
        args.push("--inference-ca".to_string());
        args.push(inference.clone());
    }
    if let Some(gas) = &spec.gas_price {
        args.push("--gas-price".to_string());
        args.push(gas.clone());
    }

    args
}
