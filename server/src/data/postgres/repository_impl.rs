//! Repository trait implementations for PostgreSQL

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::data::error::DataError;
use crate::data::traits::{
    GpuQuerier, GpuRegistry, Pinger, TenantAdmin, TenantKeyStore, UsageStore,
};
use crate::data::types::{
    ApiKeyRow, ComputeResourceRecord, GpuDetail, GpuSummary, NewApiKey, PhysicalGpuRecord,
    ResolvedKey, ResourceContextRecord, TenantRow, UsageSnapshot,
};

use super::PostgresService;
use super::repositories::{api_key, gpu, tenant, usage};

#[async_trait]
impl GpuRegistry for PostgresService {
    async fn upsert_physical_gpu(&self, record: &PhysicalGpuRecord) -> Result<(), DataError> {
        gpu::upsert_physical_gpu(self.pool(), record)
            .await
            .map_err(Into::into)
    }

    async fn upsert_compute_resource(
        &self,
        resource: &ComputeResourceRecord,
    ) -> Result<(), DataError> {
        gpu::upsert_compute_resource(self.pool(), resource)
            .await
            .map_err(Into::into)
    }

    async fn upsert_resource_context(
        &self,
        context: &ResourceContextRecord,
    ) -> Result<(), DataError> {
        gpu::upsert_resource_context(self.pool(), context)
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl GpuQuerier for PostgresService {
    async fn list_gpus(&self, tenant_id: &str) -> Result<Vec<GpuSummary>, DataError> {
        gpu::list_gpus(self.pool(), tenant_id)
            .await
            .map_err(Into::into)
    }

    async fn get_gpu(
        &self,
        tenant_id: &str,
        resource_uuid: &str,
    ) -> Result<Option<GpuDetail>, DataError> {
        gpu::get_gpu(self.pool(), tenant_id, resource_uuid)
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl UsageStore for PostgresService {
    async fn add_usage(
        &self,
        tenant_id: &str,
        day: NaiveDate,
        spans: i64,
        gpu_seconds: i64,
    ) -> Result<(), DataError> {
        usage::add_usage(self.pool(), tenant_id, day, spans, gpu_seconds)
            .await
            .map_err(Into::into)
    }

    async fn get_usage(
        &self,
        tenant_id: &str,
        day: NaiveDate,
    ) -> Result<Option<UsageSnapshot>, DataError> {
        usage::get_usage(self.pool(), tenant_id, day)
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl TenantKeyStore for PostgresService {
    async fn lookup_key(&self, key_hash: &str) -> Result<Option<ResolvedKey>, DataError> {
        api_key::get_by_hash(self.pool(), key_hash)
            .await
            .map_err(Into::into)
    }

    async fn touch_key(&self, key_hash: &str) -> Result<(), DataError> {
        api_key::touch_last_used(self.pool(), key_hash)
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl TenantAdmin for PostgresService {
    async fn create_tenant(
        &self,
        tenant_id: &str,
        name: &str,
        plan: &str,
    ) -> Result<TenantRow, DataError> {
        tenant::create_tenant(self.pool(), tenant_id, name, plan)
            .await
            .map_err(Into::into)
    }

    async fn list_tenants(&self) -> Result<Vec<TenantRow>, DataError> {
        tenant::list_tenants(self.pool()).await.map_err(Into::into)
    }

    async fn get_tenant(&self, tenant_id: &str) -> Result<Option<TenantRow>, DataError> {
        tenant::get_tenant(self.pool(), tenant_id)
            .await
            .map_err(Into::into)
    }

    async fn create_api_key(&self, key: &NewApiKey) -> Result<ApiKeyRow, DataError> {
        api_key::create_api_key(self.pool(), key)
            .await
            .map_err(Into::into)
    }

    async fn revoke_api_key(&self, tenant_id: &str, key_prefix: &str) -> Result<bool, DataError> {
        api_key::revoke_api_key(self.pool(), tenant_id, key_prefix)
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl Pinger for PostgresService {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<(), DataError> {
        sqlx::query("SELECT 1")
            .execute(self.pool())
            .await
            .map(|_| ())
            .map_err(DataError::Postgres)
    }
}
