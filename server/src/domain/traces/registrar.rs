//! GPU identity registrar
//!
//! Upserts the physical GPU, compute resource and (when labelled) resource
//! context for every GPU attachment of a flushed batch. Deduplication only
//! spans the batch being registered; nothing is remembered across flushes.

use std::collections::HashSet;
use std::sync::Arc;

use crate::data::GpuRegistry;
use crate::data::types::{
    ComputeResourceRecord, GpuAttachments, PhysicalGpuRecord, RESOURCE_TYPE_FULL_GPU,
    RESOURCE_TYPE_MIG, ResourceContextRecord, SpanRecord,
};

pub struct GpuRegistrar {
    registry: Arc<dyn GpuRegistry>,
    vendor: String,
}

impl GpuRegistrar {
    pub fn new(registry: Arc<dyn GpuRegistry>, vendor: impl Into<String>) -> Self {
        Self {
            registry,
            vendor: vendor.into(),
        }
    }

    /// Register the GPU identities seen in a batch.
    ///
    /// Each upsert is attempted independently; failures are logged and do not
    /// stop the remaining upserts.
    pub async fn register_batch(&self, batch: &[SpanRecord]) {
        let mut seen: HashSet<(&str, &str)> = HashSet::new();

        for span in batch {
            for (i, resource_uuid) in span.gpus.resource_uuids.iter().enumerate() {
                if !seen.insert((span.tenant_id.as_str(), resource_uuid.as_str())) {
                    continue;
                }
                self.register_one(&span.tenant_id, &span.gpus, i).await;
            }
        }
    }

    async fn register_one(&self, tenant_id: &str, gpus: &GpuAttachments, i: usize) {
        let resource_uuid = gpus.resource_uuids[i].as_str();
        let physical_uuid = physical_uuid(gpus, i);
        let node_id = gpus.node_id(i).unwrap_or_default().to_string();
        let memory_total_gb = gpus.memory_total_gb(i).unwrap_or_default();

        let physical = PhysicalGpuRecord {
            tenant_id: tenant_id.to_string(),
            uuid: physical_uuid.to_string(),
            model: gpus.model(i).unwrap_or_default().to_string(),
            vendor: self.vendor.clone(),
            memory_total_gb,
            node_id: node_id.clone(),
        };
        if let Err(e) = self.registry.upsert_physical_gpu(&physical).await {
            tracing::warn!(uuid = %physical_uuid, tenant_id, error = %e, "Failed to upsert physical GPU");
        }

        let resource = ComputeResourceRecord {
            tenant_id: tenant_id.to_string(),
            resource_uuid: resource_uuid.to_string(),
            physical_uuid: physical_uuid.to_string(),
            resource_type: resource_type(gpus, i, physical_uuid),
            memory_gb: memory_total_gb,
        };
        if let Err(e) = self.registry.upsert_compute_resource(&resource).await {
            tracing::warn!(uuid = %resource_uuid, tenant_id, error = %e, "Failed to upsert compute resource");
        }

        let Some(user_label) = gpus.user_label(i).filter(|l| !l.is_empty()) else {
            return;
        };
        let context = ResourceContextRecord {
            tenant_id: tenant_id.to_string(),
            resource_uuid: resource_uuid.to_string(),
            user_label: user_label.to_string(),
            hostname: node_id,
        };
        if let Err(e) = self.registry.upsert_resource_context(&context).await {
            tracing::warn!(uuid = %resource_uuid, tenant_id, error = %e, "Failed to upsert resource context");
        }
    }
}

/// Physical UUID of attachment `i`; a whole GPU reported without one is
/// its own physical device
pub(super) fn physical_uuid(gpus: &GpuAttachments, i: usize) -> &str {
    gpus.physical_uuid(i)
        .filter(|p| !p.is_empty())
        .unwrap_or(gpus.resource_uuids[i].as_str())
}

/// Explicit type when captured, otherwise `mig` when the resource and
/// physical UUIDs differ
fn resource_type(gpus: &GpuAttachments, i: usize, physical_uuid: &str) -> String {
    match gpus.resource_type(i).filter(|t| !t.is_empty()) {
        Some(explicit) => explicit.to_string(),
        None if gpus.resource_uuids[i] != physical_uuid => RESOURCE_TYPE_MIG.to_string(),
        None => RESOURCE_TYPE_FULL_GPU.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::data::DataError;

    /// Records every upsert; optionally fails physical GPU upserts
    #[derive(Default)]
    pub(crate) struct FakeRegistry {
        pub physical: Mutex<Vec<PhysicalGpuRecord>>,
        pub resources: Mutex<Vec<ComputeResourceRecord>>,
        pub contexts: Mutex<Vec<ResourceContextRecord>>,
        pub fail_physical: bool,
    }

    #[async_trait]
    impl GpuRegistry for FakeRegistry {
        async fn upsert_physical_gpu(&self, gpu: &PhysicalGpuRecord) -> Result<(), DataError> {
            if self.fail_physical {
                return Err(DataError::backend_unavailable("postgres", "down"));
            }
            self.physical.lock().push(gpu.clone());
            Ok(())
        }

        async fn upsert_compute_resource(
            &self,
            resource: &ComputeResourceRecord,
        ) -> Result<(), DataError> {
            self.resources.lock().push(resource.clone());
            Ok(())
        }

        async fn upsert_resource_context(
            &self,
            context: &ResourceContextRecord,
        ) -> Result<(), DataError> {
            self.contexts.lock().push(context.clone());
            Ok(())
        }
    }

    fn span_with(tenant: &str, gpus: GpuAttachments) -> SpanRecord {
        SpanRecord {
            tenant_id: tenant.to_string(),
            gpus,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_same_uuid_upserted_once_per_batch() {
        let registry = Arc::new(FakeRegistry::default());
        let registrar = GpuRegistrar::new(registry.clone(), "NVIDIA");

        let gpus = GpuAttachments {
            resource_uuids: vec!["GPU-a".into()],
            user_labels: vec!["trainer".into()],
            ..Default::default()
        };
        let batch = vec![
            span_with("t1", gpus.clone()),
            span_with("t1", gpus.clone()),
        ];

        registrar.register_batch(&batch).await;
        assert_eq!(registry.physical.lock().len(), 1);
        assert_eq!(registry.resources.lock().len(), 1);
        assert_eq!(registry.contexts.lock().len(), 1);

        // No memory across batches
        registrar.register_batch(&batch).await;
        assert_eq!(registry.physical.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_same_uuid_in_different_tenants_registers_both() {
        let registry = Arc::new(FakeRegistry::default());
        let registrar = GpuRegistrar::new(registry.clone(), "NVIDIA");

        let gpus = GpuAttachments {
            resource_uuids: vec!["GPU-a".into()],
            ..Default::default()
        };
        registrar
            .register_batch(&[span_with("t1", gpus.clone()), span_with("t2", gpus)])
            .await;
        assert_eq!(registry.resources.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_resource_type_inference_and_vendor() {
        let registry = Arc::new(FakeRegistry::default());
        let registrar = GpuRegistrar::new(registry.clone(), "AMD");

        let gpus = GpuAttachments {
            resource_uuids: vec!["MIG-1".into(), "GPU-2".into(), "GPU-3".into()],
            physical_uuids: vec!["GPU-1".into(), "GPU-2".into()],
            node_ids: vec!["node-a".into()],
            ..Default::default()
        };
        registrar.register_batch(&[span_with("t1", gpus)]).await;

        let resources = registry.resources.lock();
        let types: Vec<&str> = resources.iter().map(|r| r.resource_type.as_str()).collect();
        assert_eq!(types, vec!["mig", "full_gpu", "full_gpu"]);
        assert_eq!(resources[2].physical_uuid, "GPU-3");

        let physical = registry.physical.lock();
        assert!(physical.iter().all(|p| p.vendor == "AMD"));
        assert_eq!(physical[0].node_id, "node-a");
        assert_eq!(physical[1].node_id, "");
    }

    #[tokio::test]
    async fn test_explicit_resource_type_wins() {
        let registry = Arc::new(FakeRegistry::default());
        let registrar = GpuRegistrar::new(registry.clone(), "NVIDIA");

        let gpus = GpuAttachments {
            resource_uuids: vec!["GPU-1".into()],
            resource_types: vec!["mig".into()],
            ..Default::default()
        };
        registrar.register_batch(&[span_with("t1", gpus)]).await;
        assert_eq!(registry.resources.lock()[0].resource_type, "mig");
    }

    #[tokio::test]
    async fn test_sized_mig_slice_registered_verbatim() {
        let registry = Arc::new(FakeRegistry::default());
        let registrar = GpuRegistrar::new(registry.clone(), "NVIDIA");

        let gpus = GpuAttachments {
            resource_uuids: vec!["MIG-abc".into()],
            physical_uuids: vec!["GPU-1".into()],
            resource_types: vec!["mig_40gb".into()],
            user_labels: vec!["finetune".into()],
            ..Default::default()
        };
        registrar.register_batch(&[span_with("t1", gpus)]).await;

        let resources = registry.resources.lock();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].resource_uuid, "MIG-abc");
        assert_eq!(resources[0].physical_uuid, "GPU-1");
        assert_eq!(resources[0].resource_type, "mig_40gb");
        assert_eq!(registry.physical.lock()[0].uuid, "GPU-1");
        assert_eq!(registry.contexts.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_context_only_with_user_label() {
        let registry = Arc::new(FakeRegistry::default());
        let registrar = GpuRegistrar::new(registry.clone(), "NVIDIA");

        let gpus = GpuAttachments {
            resource_uuids: vec!["GPU-1".into(), "GPU-2".into()],
            node_ids: vec!["node-a".into(), "node-b".into()],
            user_labels: vec!["serving".into()],
            ..Default::default()
        };
        registrar.register_batch(&[span_with("t1", gpus)]).await;

        let contexts = registry.contexts.lock();
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].resource_uuid, "GPU-1");
        assert_eq!(contexts[0].hostname, "node-a");
        assert_eq!(contexts[0].context_id(), "GPU-1:serving");
    }

    #[tokio::test]
    async fn test_failed_upsert_does_not_block_others() {
        let registry = Arc::new(FakeRegistry {
            fail_physical: true,
            ..Default::default()
        });
        let registrar = GpuRegistrar::new(registry.clone(), "NVIDIA");

        let gpus = GpuAttachments {
            resource_uuids: vec!["GPU-1".into(), "GPU-2".into()],
            ..Default::default()
        };
        registrar.register_batch(&[span_with("t1", gpus)]).await;
        assert!(registry.physical.lock().is_empty());
        assert_eq!(registry.resources.lock().len(), 2);
    }
}
