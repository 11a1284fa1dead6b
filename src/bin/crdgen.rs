// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! CRD YAML Generator
//!
//! Generates the DNSEndpoint CRD manifest from the Rust type in
//! src/resources/crd.rs, so the YAML under deploy/crds/ stays in sync with
//! the code. The Gateway-API CRDs are not generated here: those are owned
//! and installed by the gateway-api project.
//!
//! Usage:
//!   cargo run --bin crdgen

use dnsgate::resources::crd::DNSEndpoint;
use kube::CustomResourceExt;
use serde_json::Value;
use std::fs;
use std::path::Path;

const COPYRIGHT_HEADER: &str = "# Copyright (c) 2025 Erick Bourgeois, firestoned
# SPDX-License-Identifier: MIT
#
# This file is AUTO-GENERATED from src/resources/crd.rs
# DO NOT EDIT MANUALLY - Run `cargo run --bin crdgen` to regenerate
#
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output_dir = Path::new("deploy/crds");

    // Ensure output directory exists
    fs::create_dir_all(output_dir)?;

    println!("Generating CRD YAML files from src/resources/crd.rs...");

    generate_crd::<DNSEndpoint>("dnsendpoints.crd.yaml", output_dir)?;

    println!("✓ Successfully generated CRD YAML files in deploy/crds/");
    println!("\nNext steps:");
    println!("  1. Review the generated files");
    println!("  2. Deploy with: kubectl apply -f deploy/crds/");

    Ok(())
}

fn generate_crd<T>(filename: &str, output_dir: &Path) -> Result<(), Box<dyn std::error::Error>>
where
    T: CustomResourceExt,
{
    let crd = T::crd();

    // Convert CRD to JSON for manipulation
    let mut crd_json: Value = serde_json::to_value(&crd)?;

    // The Rust type only declares the fields dnsgate reads; accept the rest
    // of the external-dns contract without schema rejection.
    if let Some(versions) = crd_json["spec"]["versions"].as_array_mut() {
        for version in versions {
            let endpoint_items = &mut version["schema"]["openAPIV3Schema"]["properties"]["spec"]
                ["properties"]["endpoints"]["items"];
            if endpoint_items.is_object() {
                endpoint_items["x-kubernetes-preserve-unknown-fields"] = Value::Bool(true);
            }
        }
    }

    // Convert back to YAML
    let yaml = serde_yaml::to_string(&crd_json)?;

    // Add copyright header
    let content = format!("{COPYRIGHT_HEADER}{yaml}");

    let output_path = output_dir.join(filename);
    fs::write(&output_path, content)?;

    println!("  ✓ Generated {filename}");

    Ok(())
}
