//! Workload object builders.
//!
//! Pure functions that construct the Deployment and ConfigMap objects for a
//! managed workload, and the provisioning mutation applied once its TLS
//! material has been uploaded.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, DeploymentStrategy};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, EnvVar, HostAlias, KeyToPath, PodSpec,
    PodTemplateSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::api::ObjectMeta;

use crate::types::{OrchestratorConfig, ProvisioningVariant};

/// Env key whose `false` value disables mutual TLS for a workload.
///
/// Such workloads need no credential upload, so their deployment starts at
/// one replica immediately instead of waiting for provisioning.
pub const TLS_ENABLED_ENV: &str = "CORE_PEER_TLS_ENABLED";

/// In-container mount paths for the baseline credential set.
pub const TLS_CLIENT_KEY_PATH: &str = "/etc/hyperledger/fabric/client.key";
/// Client certificate mount path.
pub const TLS_CLIENT_CERT_PATH: &str = "/etc/hyperledger/fabric/client.crt";
/// Peer root certificate mount path.
pub const TLS_ROOT_CERT_PATH: &str = "/etc/hyperledger/fabric/peer.crt";
/// PEM client key mount path (extended set only).
pub const TLS_CLIENT_PEM_KEY_PATH: &str = "/etc/hyperledger/fabric/client_pem.key";
/// PEM client certificate mount path (extended set only).
pub const TLS_CLIENT_PEM_CERT_PATH: &str = "/etc/hyperledger/fabric/client_pem.crt";

/// Name of the ConfigMap companion object for a workload.
#[must_use]
pub fn config_map_name(workload: &str) -> String {
    format!("{workload}-configmap")
}

/// Name of the ConfigMap-backed volume inside the pod spec.
#[must_use]
pub fn volume_name(workload: &str) -> String {
    format!("{workload}-config")
}

/// Desired replicas at creation time.
///
/// Zero until TLS material is uploaded; one immediately when the workload
/// declares mutual TLS disabled.
#[must_use]
pub fn initial_replicas(env: &[String]) -> i32 {
    let tls_disabled = env
        .iter()
        .filter_map(|pair| pair.split_once('='))
        .any(|(key, value)| key == TLS_ENABLED_ENV && value == "false");

    i32::from(tls_disabled)
}

/// Build the Deployment object for a workload.
#[must_use]
pub fn build_deployment(
    name: &str,
    image: &str,
    env: &[String],
    cmd: &[String],
    config: &OrchestratorConfig,
) -> Deployment {
    let labels: BTreeMap<String, String> =
        [("app".to_string(), name.to_string())].into_iter().collect();

    Deployment {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(config.namespace.clone()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(initial_replicas(env)),
            strategy: Some(DeploymentStrategy {
                type_: Some("Recreate".to_string()),
                ..Default::default()
            }),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    name: Some(name.to_string()),
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![build_container(name, image, env, cmd)],
                    host_aliases: build_host_aliases(&config.dns),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Build the ConfigMap holding a workload's uploaded TLS material.
#[must_use]
pub fn build_config_map(workload: &str, data: &BTreeMap<String, String>) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(config_map_name(workload)),
            ..Default::default()
        },
        data: Some(data.clone()),
        ..Default::default()
    }
}

/// Mutate a fetched Deployment into its provisioned form.
///
/// Raises desired replicas to one and attaches the ConfigMap-backed volume
/// plus the per-variant mounts at the fixed credential paths. Desired
/// replicas never transition back to zero; teardown deletes the whole
/// object instead.
pub fn apply_provisioning(deployment: &mut Deployment, workload: &str, variant: ProvisioningVariant) {
    let spec = deployment.spec.get_or_insert_with(Default::default);
    spec.replicas = Some(1);

    let (items, mounts) = credential_projection(workload, variant);

    let pod_spec = spec.template.spec.get_or_insert_with(Default::default);

    pod_spec.volumes.get_or_insert_with(Vec::new).push(Volume {
        name: volume_name(workload),
        config_map: Some(ConfigMapVolumeSource {
            name: config_map_name(workload),
            items: Some(items),
            ..Default::default()
        }),
        ..Default::default()
    });

    if let Some(container) = pod_spec.containers.first_mut() {
        container
            .volume_mounts
            .get_or_insert_with(Vec::new)
            .extend(mounts);
    }
}

/// The projected keys and matching mounts for a provisioning variant.
fn credential_projection(
    workload: &str,
    variant: ProvisioningVariant,
) -> (Vec<KeyToPath>, Vec<VolumeMount>) {
    let mut keys = vec![
        ("client.key", TLS_CLIENT_KEY_PATH),
        ("client.crt", TLS_CLIENT_CERT_PATH),
        ("peer.crt", TLS_ROOT_CERT_PATH),
    ];
    if variant == ProvisioningVariant::Extended {
        keys.push(("client_pem.key", TLS_CLIENT_PEM_KEY_PATH));
        keys.push(("client_pem.crt", TLS_CLIENT_PEM_CERT_PATH));
    }

    let items = keys
        .iter()
        .map(|(key, _)| KeyToPath {
            key: (*key).to_string(),
            path: (*key).to_string(),
            ..Default::default()
        })
        .collect();

    let mounts = keys
        .iter()
        .map(|(key, mount_path)| VolumeMount {
            name: volume_name(workload),
            mount_path: (*mount_path).to_string(),
            sub_path: Some((*key).to_string()),
            ..Default::default()
        })
        .collect();

    (items, mounts)
}

fn build_container(name: &str, image: &str, env: &[String], cmd: &[String]) -> Container {
    let env_vars: Vec<EnvVar> = env
        .iter()
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair.as_str(), ""));
            EnvVar {
                name: key.to_string(),
                value: Some(value.to_string()),
                ..Default::default()
            }
        })
        .collect();

    Container {
        name: name.to_string(),
        image: Some(image.to_string()),
        image_pull_policy: Some("IfNotPresent".to_string()),
        env: Some(env_vars),
        command: Some(cmd.to_vec()),
        ..Default::default()
    }
}

fn build_host_aliases(dns: &[String]) -> Option<Vec<HostAlias>> {
    if dns.is_empty() {
        return None;
    }

    Some(
        dns.iter()
            .filter_map(|pair| pair.split_once(':'))
            .map(|(ip, hostname)| HostAlias {
                ip: ip.to_string(),
                hostnames: Some(vec![hostname.to_string()]),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> OrchestratorConfig {
        OrchestratorConfig {
            namespace: "workloads".to_string(),
            dns: vec!["10.0.0.1:peer0.org1".to_string()],
        }
    }

    #[test]
    fn deployment_starts_unprovisioned() {
        let deployment = build_deployment(
            "dev-peer0-org1-mycc",
            "registry.example.com/proj/mycc",
            &["CORE_PEER_TLS_ENABLED=true".to_string()],
            &["chaincode".to_string()],
            &test_config(),
        );

        let spec = deployment.spec.as_ref().unwrap();
        assert_eq!(spec.replicas, Some(0));
        assert_eq!(
            spec.strategy.as_ref().unwrap().type_.as_deref(),
            Some("Recreate")
        );

        let labels = spec.selector.match_labels.as_ref().unwrap();
        assert_eq!(labels.get("app"), Some(&"dev-peer0-org1-mycc".to_string()));

        let pod_spec = spec.template.spec.as_ref().unwrap();
        let container = &pod_spec.containers[0];
        assert_eq!(container.image_pull_policy.as_deref(), Some("IfNotPresent"));
        assert_eq!(
            container.image.as_deref(),
            Some("registry.example.com/proj/mycc")
        );

        let aliases = pod_spec.host_aliases.as_ref().unwrap();
        assert_eq!(aliases[0].ip, "10.0.0.1");
        assert_eq!(aliases[0].hostnames.as_ref().unwrap()[0], "peer0.org1");
    }

    #[test]
    fn tls_disabled_workload_starts_at_one_replica() {
        let env = vec!["CORE_PEER_TLS_ENABLED=false".to_string()];
        assert_eq!(initial_replicas(&env), 1);

        let deployment = build_deployment("w", "img", &env, &[], &test_config());
        assert_eq!(deployment.spec.unwrap().replicas, Some(1));
    }

    #[test]
    fn provisioning_baseline_mounts_three_keys() {
        let mut deployment = build_deployment("w", "img", &[], &[], &test_config());
        apply_provisioning(&mut deployment, "w", ProvisioningVariant::Baseline);

        let spec = deployment.spec.unwrap();
        assert_eq!(spec.replicas, Some(1));

        let pod_spec = spec.template.spec.unwrap();
        let volume = &pod_spec.volumes.as_ref().unwrap()[0];
        assert_eq!(volume.name, "w-config");

        let source = volume.config_map.as_ref().unwrap();
        assert_eq!(source.name, "w-configmap");
        assert_eq!(source.items.as_ref().unwrap().len(), 3);

        let mounts = pod_spec.containers[0].volume_mounts.as_ref().unwrap();
        assert_eq!(mounts.len(), 3);
        let paths: Vec<_> = mounts.iter().map(|m| m.mount_path.as_str()).collect();
        assert!(paths.contains(&TLS_CLIENT_KEY_PATH));
        assert!(paths.contains(&TLS_CLIENT_CERT_PATH));
        assert!(paths.contains(&TLS_ROOT_CERT_PATH));
    }

    #[test]
    fn provisioning_extended_mounts_five_keys() {
        let mut deployment = build_deployment("w", "img", &[], &[], &test_config());
        apply_provisioning(&mut deployment, "w", ProvisioningVariant::Extended);

        let pod_spec = deployment.spec.unwrap().template.spec.unwrap();
        let volume = &pod_spec.volumes.as_ref().unwrap()[0];
        assert_eq!(volume.config_map.as_ref().unwrap().items.as_ref().unwrap().len(), 5);

        let mounts = pod_spec.containers[0].volume_mounts.as_ref().unwrap();
        assert_eq!(mounts.len(), 5);
        let paths: Vec<_> = mounts.iter().map(|m| m.mount_path.as_str()).collect();
        assert!(paths.contains(&TLS_CLIENT_PEM_KEY_PATH));
        assert!(paths.contains(&TLS_CLIENT_PEM_CERT_PATH));
    }

    #[test]
    fn config_map_carries_material() {
        let data: BTreeMap<String, String> = [
            ("client.key".to_string(), "key-bytes".to_string()),
            ("client.crt".to_string(), "crt-bytes".to_string()),
        ]
        .into_iter()
        .collect();

        let config_map = build_config_map("w", &data);
        assert_eq!(config_map.metadata.name.as_deref(), Some("w-configmap"));
        assert_eq!(config_map.data.unwrap().len(), 2);
    }
}
