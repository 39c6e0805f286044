//! The Invocation Engine (C6, §4.6): resolves an operation request into a
//! bound call against a freshly-built provider instance, running the
//! `OperationInvocation` state machine around it.
//!
//! `submit` covers `immediate`/`redirect` execution modes inline on the
//! caller's task; `deferred` operations are handed to a `DeferredQueue`
//! and picked up later by `run_deferred`, which a background worker task
//! drives via `deferred::run_worker`. Both paths converge on `execute`,
//! so dibs acquisition and terminal-state bookkeeping happen exactly once
//! no matter which path an operation takes.

use gravy_crypto::Cipher;
use gravy_domain::entities::{AuthorizedAccount, ConfiguredAddon, ExternalCredentialsRecord, ExternalService};
use gravy_domain::repository::{
    AuthorizedAccountRepository, ConfiguredAddonRepository, ExternalCredentialsRepository, ExternalServiceRepository,
    OAuth1ClientConfigRepository, OAuth2ClientConfigRepository,
};
use gravy_oauth::SingleFlightRefresher;
use gravy_operations::{OperationDeclaration, Registry};
use serde_json::Value;
use shared::errors::ApiError;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::binding::bind_arguments;
use crate::credentials_provider::{decrypt_credentials, AccountCredentialsProvider, OAuth1ClientParams, OAuth2ClientParams};
use crate::deferred::DeferredQueue;
use crate::factory::AddonInstanceFactory;
use crate::handlers::dispatch;
use crate::invocation::{InvocationRepository, OperationInvocation};

struct InvocationContext {
    service: ExternalService,
    account: AuthorizedAccount,
    addon: Option<ConfiguredAddon>,
    credentials_record: ExternalCredentialsRecord,
    declaration: OperationDeclaration,
}

pub struct InvocationEngine {
    services: ExternalServiceRepository,
    accounts: AuthorizedAccountRepository,
    addons: ConfiguredAddonRepository,
    credentials: ExternalCredentialsRepository,
    oauth2_clients: OAuth2ClientConfigRepository,
    oauth1_clients: OAuth1ClientConfigRepository,
    invocations: InvocationRepository,
    registry: Arc<Registry>,
    cipher: Arc<Cipher>,
    refresher: Arc<SingleFlightRefresher>,
    http_client: reqwest::Client,
    http_timeout: Duration,
    invocation_timeout: Duration,
    deferred: Arc<dyn DeferredQueue>,
}

#[allow(clippy::too_many_arguments)]
impl InvocationEngine {
    pub fn new(
        services: ExternalServiceRepository,
        accounts: AuthorizedAccountRepository,
        addons: ConfiguredAddonRepository,
        credentials: ExternalCredentialsRepository,
        oauth2_clients: OAuth2ClientConfigRepository,
        oauth1_clients: OAuth1ClientConfigRepository,
        invocations: InvocationRepository,
        registry: Arc<Registry>,
        cipher: Arc<Cipher>,
        refresher: Arc<SingleFlightRefresher>,
        http_client: reqwest::Client,
        http_timeout: Duration,
        invocation_timeout: Duration,
        deferred: Arc<dyn DeferredQueue>,
    ) -> Self {
        Self {
            services,
            accounts,
            addons,
            credentials,
            oauth2_clients,
            oauth1_clients,
            invocations,
            registry,
            cipher,
            refresher,
            http_client,
            http_timeout,
            invocation_timeout,
            deferred,
        }
    }

    /// Resolves account/service/addon/credentials for an invocation and
    /// looks up the operation's declaration, enforcing the
    /// capability-intersection rule (§4.4: `implemented(provider) ∩
    /// operations_for_capabilities(caps)`) before any row is written.
    async fn load_context(
        &self,
        operation_qualified_name: &str,
        account_id: Uuid,
        configured_addon_id: Option<Uuid>,
    ) -> Result<InvocationContext, ApiError> {
        let account = self
            .accounts
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| ApiError::NotFound { resource: format!("account {account_id}") })?;

        let service = self
            .services
            .find_by_id(account.external_service_id)
            .await?
            .ok_or_else(|| ApiError::NotFound { resource: format!("service {}", account.external_service_id) })?;

        let addon = match configured_addon_id {
            Some(id) => Some(
                self.addons
                    .find_by_id(id)
                    .await?
                    .ok_or_else(|| ApiError::NotFound { resource: format!("addon {id}") })?,
            ),
            None => None,
        };

        let credentials_record = self
            .credentials
            .find_by_id(account.external_credentials_id)
            .await?
            .ok_or_else(|| {
                ApiError::NotFound { resource: format!("credentials {}", account.external_credentials_id) }
            })?;

        let caps = addon.as_ref().map(|a| a.connected_capabilities()).unwrap_or_else(|| account.authorized_capabilities());

        let declaration = self
            .registry
            .authorized_operations(service.implementation_id, caps)
            .map_err(|_| ApiError::Forbidden)
            .and_then(|ops| {
                ops.into_iter()
                    .find(|op| op.qualified_name() == operation_qualified_name)
                    .cloned()
                    .ok_or_else(|| ApiError::InvalidArguments {
                        message: format!("operation {operation_qualified_name:?} is not authorized for this account"),
                    })
            })?;

        Ok(InvocationContext { service, account, addon, credentials_record, declaration })
    }

    fn oauth2_client_params(&self, config: &gravy_domain::entities::OAuth2ClientConfig) -> OAuth2ClientParams {
        OAuth2ClientParams {
            token_uri: config.token_uri.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            quirks: config.quirks,
        }
    }

    fn oauth1_client_params(&self, config: &gravy_domain::entities::OAuth1ClientConfig) -> OAuth1ClientParams {
        OAuth1ClientParams { consumer_key: config.client_key.clone(), consumer_secret: config.client_secret.clone() }
    }

    /// Submits a new invocation: validates and binds arguments, persists
    /// the `STARTING` row, then either runs it inline (`immediate` /
    /// `redirect`) or hands it to the deferred queue.
    pub async fn submit(
        &self,
        operation_qualified_name: &str,
        account_id: Uuid,
        configured_addon_id: Option<Uuid>,
        arguments: Value,
    ) -> Result<OperationInvocation, ApiError> {
        let context = self.load_context(operation_qualified_name, account_id, configured_addon_id).await?;
        let bound = bind_arguments(&context.declaration, &arguments)?;
        let bound_value = serde_json::to_value(&bound).map_err(|e| ApiError::InternalError { message: e.to_string() })?;

        let invocation = self.invocations.create(operation_qualified_name, account_id, configured_addon_id, bound_value).await?;

        match context.declaration.execution_mode {
            gravy_operations::ExecutionMode::Immediate | gravy_operations::ExecutionMode::Redirect => {
                self.execute(invocation, Uuid::new_v4()).await
            }
            gravy_operations::ExecutionMode::Deferred => {
                self.deferred.publish(invocation.id).await?;
                Ok(invocation)
            }
        }
    }

    pub async fn find_invocation(&self, invocation_id: Uuid) -> Result<Option<OperationInvocation>, ApiError> {
        self.invocations.find_by_id(invocation_id).await
    }

    /// Re-runs a previously-submitted deferred invocation by id; the
    /// background worker's entry point (§4.6 "a worker picks it up
    /// later").
    pub async fn run_deferred(&self, invocation_id: Uuid, worker_id: Uuid) -> Result<(), ApiError> {
        let invocation = self
            .invocations
            .find_by_id(invocation_id)
            .await?
            .ok_or_else(|| ApiError::NotFound { resource: format!("invocation {invocation_id}") })?;
        self.execute(invocation, worker_id).await.map(|_| ())
    }

    /// Acquires the execution lease, builds the provider instance, and
    /// runs the dispatched call under the invocation timeout, committing
    /// exactly one terminal state.
    ///
    /// The provider call runs outside any database transaction: a
    /// provider implementation never writes to this service's schema, so
    /// there is nothing for a "nested transaction" to isolate here beyond
    /// the two independent statements below — acquiring dibs and writing
    /// the terminal state each commit on their own, so a crash between
    /// them leaves an `IN_PROGRESS` row rather than a torn write.
    async fn execute(&self, invocation: OperationInvocation, worker_id: Uuid) -> Result<OperationInvocation, ApiError> {
        let leased = match self.invocations.acquire_dibs(invocation.id, worker_id).await? {
            Some(leased) => leased,
            None => return Err(ApiError::DibsDenied),
        };

        let context = match self
            .load_context(&leased.operation_name, leased.account_id, leased.configured_addon_id)
            .await
        {
            Ok(context) => context,
            Err(e) => {
                self.invocations.mark_problem(leased.id, e.invocation_kind(), &e.to_string()).await?;
                return Err(e);
            }
        };

        let bound: std::collections::HashMap<String, Value> =
            serde_json::from_value(leased.arguments.clone()).map_err(|e| ApiError::InternalError { message: e.to_string() })?;

        let result = self.run_provider_call(&context, &bound).await;

        match result {
            Ok(value) => self.invocations.mark_success(leased.id, value).await,
            Err(e) => {
                let invocation = self.invocations.mark_problem(leased.id, e.invocation_kind(), &e.to_string()).await?;
                if e.is_server_error() {
                    tracing::error!(invocation_id = %invocation.id, error = %e, "invocation failed");
                }
                Ok(invocation)
            }
        }
    }

    async fn run_provider_call(
        &self,
        context: &InvocationContext,
        bound: &std::collections::HashMap<String, Value>,
    ) -> Result<Value, ApiError> {
        let oauth2_client = match context.service.oauth2_client_config_id {
            Some(id) => self.oauth2_clients.find_by_id(id).await?.map(|c| self.oauth2_client_params(&c)),
            None => None,
        };
        let oauth1_client = match context.service.oauth1_client_config_id {
            Some(id) => self.oauth1_clients.find_by_id(id).await?.map(|c| self.oauth1_client_params(&c)),
            None => None,
        };

        let initial_credentials = decrypt_credentials(&self.cipher, &context.credentials_record)
            .map_err(|e| ApiError::CredentialError { message: e.to_string() })?;

        let credentials_provider: Arc<dyn gravy_http::CredentialsProvider> = Arc::new(AccountCredentialsProvider::new(
            context.account.id,
            context.credentials_record.id,
            initial_credentials,
            Arc::clone(&self.cipher),
            Arc::new(self.credentials.clone()),
            Arc::clone(&self.refresher),
            self.http_client.clone(),
            oauth2_client,
            oauth1_client,
        ));

        let provider = AddonInstanceFactory::build(
            &context.service,
            &context.account,
            context.addon.as_ref(),
            credentials_provider,
            self.http_timeout,
        )?;

        let qualified_name = context.declaration.qualified_name();
        match tokio::time::timeout(self.invocation_timeout, dispatch(&qualified_name, &provider, bound)).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Timeout),
        }
    }
}
