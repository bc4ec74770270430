//! Axum route handlers.
//!
//! Endpoints:
//! - `POST /authorizations` - typed data and nonce for a wallet to sign
//! - `POST /transactions` - store a signed authorization
//! - `GET /transactions` - query stored authorizations
//! - `GET /transactions/{id}` - one stored authorization
//! - `GET /transactions/{id}/call` - the contract call that executes it
//! - `POST /transactions/{id}/execute` - execute it with the server's sponsor wallet
//! - `PATCH /execute` - record a transaction a sponsor sent itself
//! - `POST /campaigns`, `GET /campaigns` - sponsor campaigns
//! - `GET /chains` - supported chains
//! - `GET /health` - liveness

use std::sync::Arc;

use alloy_primitives::{Address, B256, TxHash};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use circlepay::chain::caip2;
use circlepay::{
    AuthorizationNonce, Campaign, CampaignStore, ChainId, CirclePayError, ExecutionPath,
    NewCampaign, NewTransfer, SystemClock, TokenAmount, TransferAuthorization, TransferFilter,
    TransferId, TransferStore, UnixTimestamp,
};
use circlepay_evm::{
    AuthorizationRequest, ContractCallService, ExecutionReport, ExecutionRouter, NonceGenerator,
    PreparedCall, build_authorization_message, verify_transfer_signature,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::ApiError;

/// Shared application state.
pub struct AppState<C> {
    /// Execution router; also owns the transfer store via its reconciler.
    pub router: Arc<ExecutionRouter<C>>,
    /// Campaign persistence.
    pub campaigns: Arc<dyn CampaignStore>,
    /// Nonce source for `POST /authorizations`.
    pub nonces: Arc<NonceGenerator<SystemClock>>,
    /// Require stored signatures to recover to the sender.
    pub require_eoa_signatures: bool,
    /// Cancelled on shutdown; aborts in-flight executions.
    pub shutdown: CancellationToken,
}

impl<C> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            router: Arc::clone(&self.router),
            campaigns: Arc::clone(&self.campaigns),
            nonces: Arc::clone(&self.nonces),
            require_eoa_signatures: self.require_eoa_signatures,
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<C> std::fmt::Debug for AppState<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("router", &self.router)
            .field("require_eoa_signatures", &self.require_eoa_signatures)
            .finish_non_exhaustive()
    }
}

impl<C: ContractCallService> AppState<C> {
    /// Creates the state with a fresh nonce generator and shutdown token.
    #[must_use]
    pub fn new(
        router: ExecutionRouter<C>,
        campaigns: Arc<dyn CampaignStore>,
        require_eoa_signatures: bool,
    ) -> Self {
        Self {
            router: Arc::new(router),
            campaigns,
            nonces: Arc::new(NonceGenerator::new(SystemClock)),
            require_eoa_signatures,
            shutdown: CancellationToken::new(),
        }
    }

    /// Replaces the shutdown token.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    fn transfers(&self) -> &Arc<dyn TransferStore> {
        self.router.reconciler().store()
    }
}

/// Body of `POST /authorizations`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationInput {
    /// Token holder who will sign.
    pub from: Address,
    /// Beneficiary.
    pub to: Address,
    /// Human decimal amount, e.g. `"12.34"`.
    pub amount: String,
    /// Earliest execution time; `0` if omitted.
    #[serde(default)]
    pub valid_after: UnixTimestamp,
    /// Expiry time.
    pub valid_before: UnixTimestamp,
    /// Origin chain.
    pub chain_id: ChainId,
    /// Destination chain; the origin chain if omitted.
    #[serde(default)]
    pub destination_chain: Option<ChainId>,
}

/// Response of `POST /authorizations`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationResponse {
    /// `eth_signTypedData_v4` payload.
    pub typed_data: serde_json::Value,
    /// The derived nonce.
    pub nonce: AuthorizationNonce,
    /// Amount in base units.
    pub amount: TokenAmount,
    /// EIP-712 digest the wallet signs.
    pub signing_hash: B256,
    /// Path the transfer will take.
    pub path: ExecutionPath,
}

/// `POST /authorizations`
///
/// # Errors
///
/// Returns 400 for an unparsable amount, zero sender or amount, or an
/// unsupported chain.
pub async fn post_authorization<C: ContractCallService>(
    State(state): State<AppState<C>>,
    Json(input): Json<AuthorizationInput>,
) -> Result<Json<AuthorizationResponse>, ApiError> {
    let value = TokenAmount::from_decimal_str(&input.amount)
        .map_err(|e| CirclePayError::invalid_input(e.to_string()))?;
    let nonce = state.nonces.generate(Some(input.from))?;
    let request = AuthorizationRequest {
        from: input.from,
        to: input.to,
        value,
        valid_after: input.valid_after,
        valid_before: input.valid_before,
        nonce,
        chain_id: input.chain_id,
        destination_chain: input.destination_chain.unwrap_or(input.chain_id),
    };
    let typed = build_authorization_message(state.router.registry(), &request)?;
    Ok(Json(AuthorizationResponse {
        typed_data: typed.to_typed_data(),
        nonce,
        amount: value,
        signing_hash: typed.signing_hash(),
        path: typed.path,
    }))
}

/// `POST /transactions`
///
/// # Errors
///
/// Returns 400 for a missing field or, when EOA signatures are required, a
/// signature that does not recover to the sender.
pub async fn post_transaction<C: ContractCallService>(
    State(state): State<AppState<C>>,
    Json(input): Json<NewTransfer>,
) -> Result<(StatusCode, Json<TransferAuthorization>), ApiError> {
    if state.require_eoa_signatures {
        let validated = input.clone().validate()?;
        verify_transfer_signature(state.router.registry(), &validated, true)?;
    }
    let record = state.transfers().create(input).await?;
    tracing::info!(
        transfer_id = %record.id,
        chain_id = record.chain_id,
        destination_chain = record.destination_chain,
        sender = %record.sender,
        nonce = %record.nonce,
        "authorization stored"
    );
    Ok((StatusCode::CREATED, Json(record)))
}

/// Query of `GET /transactions`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionQuery {
    /// Initiating party.
    pub initiator: Option<Address>,
    /// Token holder.
    pub sender: Option<Address>,
    /// Beneficiary.
    pub receiver: Option<Address>,
    /// `"true"` for executed records, anything else for pending ones.
    pub status: Option<String>,
}

impl From<TransactionQuery> for TransferFilter {
    fn from(value: TransactionQuery) -> Self {
        Self {
            initiator: value.initiator,
            sender: value.sender,
            receiver: value.receiver,
            executed: value.status.map(|s| s == "true"),
        }
    }
}

/// `GET /transactions`
///
/// # Errors
///
/// Returns 500 if the store fails.
pub async fn get_transactions<C: ContractCallService>(
    State(state): State<AppState<C>>,
    Query(query): Query<TransactionQuery>,
) -> Result<Json<Vec<TransferAuthorization>>, ApiError> {
    let records = state.transfers().query(&query.into()).await?;
    Ok(Json(records))
}

/// `GET /transactions/{id}`
///
/// # Errors
///
/// Returns 404 for an unknown ID.
pub async fn get_transaction<C: ContractCallService>(
    State(state): State<AppState<C>>,
    Path(id): Path<TransferId>,
) -> Result<Json<TransferAuthorization>, ApiError> {
    let record = state
        .transfers()
        .find_by_id(id)
        .await?
        .ok_or(CirclePayError::NotFound(id))?;
    Ok(Json(record))
}

/// `GET /transactions/{id}/call`
///
/// # Errors
///
/// Returns 404 for an unknown ID and 400 for an unsupported chain.
pub async fn get_prepared_call<C: ContractCallService>(
    State(state): State<AppState<C>>,
    Path(id): Path<TransferId>,
) -> Result<Json<PreparedCall>, ApiError> {
    Ok(Json(state.router.prepare(id).await?))
}

/// `POST /transactions/{id}/execute`
///
/// # Errors
///
/// Returns 503 without a sponsor wallet for the chain, 409 if already
/// executed, 422 on revert and 502 on submission or confirmation failure.
pub async fn post_execute<C: ContractCallService>(
    State(state): State<AppState<C>>,
    Path(id): Path<TransferId>,
) -> Result<Json<ExecutionReport>, ApiError> {
    let prepared = state.router.prepare(id).await?;
    if state.router.sponsor(prepared.chain_id).is_none() {
        return Err(ApiError::NoSponsor(prepared.chain_id));
    }
    let cancel = state.shutdown.child_token();
    let report = state.router.execute(id, &cancel).await?;
    tracing::info!(
        transfer_id = %id,
        tx = %report.transaction_hash,
        path = %report.path,
        "transfer executed"
    );
    Ok(Json(report))
}

/// Body of `PATCH /execute`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportedExecution {
    /// The executed transfer.
    pub transaction_id: TransferId,
    /// Hash of the sponsor's transaction.
    pub transaction_hash: TxHash,
}

/// `PATCH /execute`
///
/// # Errors
///
/// Returns 400 if the chain has no receipt for the hash, 422 if it reverted,
/// 404 for an unknown ID and 409 if already executed.
pub async fn patch_execute<C: ContractCallService>(
    State(state): State<AppState<C>>,
    Json(body): Json<ReportedExecution>,
) -> Result<Json<TransferAuthorization>, ApiError> {
    let record = state
        .router
        .record_reported(body.transaction_id, body.transaction_hash)
        .await?;
    tracing::info!(
        transfer_id = %record.id,
        tx = %body.transaction_hash,
        "reported execution recorded"
    );
    Ok(Json(record))
}

/// `POST /campaigns`
///
/// # Errors
///
/// Returns 400 for a missing field or a duplicate ID.
pub async fn post_campaign<C: ContractCallService>(
    State(state): State<AppState<C>>,
    Json(input): Json<NewCampaign>,
) -> Result<(StatusCode, Json<Campaign>), ApiError> {
    let campaign = state.campaigns.create(input).await?;
    Ok((StatusCode::CREATED, Json(campaign)))
}

/// Query of `GET /campaigns`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CampaignQuery {
    /// Look up one campaign.
    pub id: Option<String>,
    /// List the campaigns of an owner.
    pub owner: Option<Address>,
}

/// `GET /campaigns?id=…` or `GET /campaigns?owner=…`
///
/// # Errors
///
/// Returns 404 for an unknown ID and 400 if neither parameter is given.
pub async fn get_campaigns<C: ContractCallService>(
    State(state): State<AppState<C>>,
    Query(query): Query<CampaignQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if let Some(id) = query.id {
        let campaign = state
            .campaigns
            .find_by_id(&id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("campaign `{id}` not found")))?;
        return Ok(Json(serde_json::json!(campaign)));
    }
    let owner = query
        .owner
        .ok_or_else(|| ApiError::BadRequest("either `id` or `owner` is required".into()))?;
    let campaigns = state.campaigns.list_by_owner(owner).await?;
    Ok(Json(serde_json::json!(campaigns)))
}

/// One entry of `GET /chains`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainView {
    /// EIP-155 chain ID.
    pub chain_id: ChainId,
    /// CAIP-2 identifier.
    pub network: String,
    /// Human-readable name.
    pub name: String,
    /// USDC token contract.
    pub token: Address,
    /// Cross-chain settlement contract.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement: Option<Address>,
    /// Whether this server can sponsor executions on the chain.
    pub sponsored: bool,
}

/// `GET /chains`
pub async fn get_chains<C: ContractCallService>(
    State(state): State<AppState<C>>,
) -> Json<Vec<ChainView>> {
    let chains = state
        .router
        .registry()
        .deployments()
        .into_iter()
        .map(|d| ChainView {
            chain_id: d.chain_id,
            network: caip2(d.chain_id),
            name: d.name.clone(),
            token: d.token.address,
            settlement: d.settlement,
            sponsored: state.router.sponsor(d.chain_id).is_some(),
        })
        .collect();
    Json(chains)
}

/// `GET /health`
pub async fn get_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Creates an Axum [`Router`] with all endpoints.
pub fn app_router<C>(state: AppState<C>) -> Router
where
    C: ContractCallService + 'static,
{
    Router::new()
        .route("/authorizations", post(post_authorization::<C>))
        .route(
            "/transactions",
            post(post_transaction::<C>).get(get_transactions::<C>),
        )
        .route("/transactions/{id}", get(get_transaction::<C>))
        .route("/transactions/{id}/call", get(get_prepared_call::<C>))
        .route("/transactions/{id}/execute", post(post_execute::<C>))
        .route("/execute", patch(patch_execute::<C>))
        .route(
            "/campaigns",
            post(post_campaign::<C>).get(get_campaigns::<C>),
        )
        .route("/chains", get(get_chains::<C>))
        .route("/health", get(get_health))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use alloy_primitives::{address, hex, keccak256};
    use alloy_signer::SignerSync;
    use alloy_signer_local::PrivateKeySigner;
    use axum::body::Body;
    use axum::http::{Method, Request, header};
    use circlepay::{
        ExecutionReceipt, MemoryCampaignStore, MemoryTransferStore, ReceiptReconciler,
    };
    use circlepay_evm::{BASE_SEPOLIA, CallError, ChainRegistry, MetaTransaction, PendingCall};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;

    const RECEIVER: Address = address!("0xBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB");
    const SPONSOR: Address = Address::repeat_byte(0x5b);

    #[derive(Clone, Default)]
    struct FakeChain {
        submitted: Arc<Mutex<Vec<MetaTransaction>>>,
    }

    struct FakePending(TxHash);

    impl PendingCall for FakePending {
        fn tx_hash(&self) -> TxHash {
            self.0
        }

        async fn confirm(self) -> Result<ExecutionReceipt, CallError> {
            Ok(ExecutionReceipt {
                transaction_hash: self.0,
                success: true,
                block_number: Some(1),
            })
        }
    }

    impl ContractCallService for FakeChain {
        type Pending = FakePending;

        fn sponsor(&self) -> Option<Address> {
            Some(SPONSOR)
        }

        async fn submit(&self, tx: MetaTransaction) -> Result<FakePending, CallError> {
            let hash = keccak256(&tx.calldata);
            self.submitted.lock().unwrap().push(tx);
            Ok(FakePending(hash))
        }

        async fn receipt(&self, _tx: TxHash) -> Result<Option<ExecutionReceipt>, CallError> {
            Ok(None)
        }
    }

    fn app(service: Option<FakeChain>, require_eoa: bool) -> Router {
        let registry = Arc::new(ChainRegistry::known());
        let store: Arc<dyn TransferStore> = Arc::new(MemoryTransferStore::new());
        let mut router = ExecutionRouter::new(registry, ReceiptReconciler::new(store));
        if let Some(service) = service {
            router = router.with_service(BASE_SEPOLIA, service);
        }
        app_router(AppState::new(
            router,
            Arc::new(MemoryCampaignStore::new()),
            require_eoa,
        ))
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn sender_key() -> PrivateKeySigner {
        PrivateKeySigner::from_bytes(&B256::repeat_byte(0x11)).unwrap()
    }

    /// Requests typed data for `from`, signs it with `signer` and returns the
    /// store input.
    async fn signed_transfer(app: &Router, signer: &PrivateKeySigner, from: Address) -> Value {
        let (status, auth) = send(
            app,
            Method::POST,
            "/authorizations",
            Some(json!({
                "from": from,
                "to": RECEIVER,
                "amount": "5",
                "validBefore": 1_900_000_000u64,
                "chainId": BASE_SEPOLIA,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{auth}");
        assert_eq!(auth["amount"], "5000000");
        assert_eq!(auth["path"]["kind"], "sameChain");
        assert_eq!(auth["typedData"]["primaryType"], "TransferWithAuthorization");

        let hash: B256 = auth["signingHash"].as_str().unwrap().parse().unwrap();
        let signature = signer.sign_hash_sync(&hash).unwrap();
        json!({
            "initiator": from,
            "sender": from,
            "receiver": RECEIVER,
            "amount": auth["amount"],
            "chainId": BASE_SEPOLIA,
            "destinationChain": BASE_SEPOLIA,
            "validAfter": 0,
            "validBefore": 1_900_000_000u64,
            "nonce": auth["nonce"],
            "sign": hex::encode_prefixed(signature.as_bytes()),
        })
    }

    #[tokio::test]
    async fn test_health() {
        let app = app(None, true);
        let (status, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_authorize_store_and_execute() {
        let chain = FakeChain::default();
        let app = app(Some(chain.clone()), true);
        let signer = sender_key();

        let input = signed_transfer(&app, &signer, signer.address()).await;
        let (status, created) = send(&app, Method::POST, "/transactions", Some(input)).await;
        assert_eq!(status, StatusCode::CREATED, "{created}");
        assert_eq!(created["executed"], false);
        let id = created["id"].as_str().unwrap().to_owned();

        let (_, pending) = send(&app, Method::GET, "/transactions?status=false", None).await;
        assert_eq!(pending.as_array().unwrap().len(), 1);

        let (status, call) = send(&app, Method::GET, &format!("/transactions/{id}/call"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(call["functionName"], "transferWithAuthorization");

        let (status, report) = send(
            &app,
            Method::POST,
            &format!("/transactions/{id}/execute"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{report}");
        assert_eq!(report["outcome"], "recorded");
        assert_eq!(chain.submitted.lock().unwrap().len(), 1);

        let (_, stored) = send(&app, Method::GET, &format!("/transactions/{id}"), None).await;
        assert_eq!(stored["executed"], true);
        assert_eq!(stored["transactionHash"], report["transactionHash"]);

        let (_, executed) = send(&app, Method::GET, "/transactions?status=true", None).await;
        assert_eq!(executed.as_array().unwrap().len(), 1);

        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/transactions/{id}/execute"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(chain.submitted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_signature_from_another_key_is_rejected() {
        let app = app(Some(FakeChain::default()), true);
        let impostor = PrivateKeySigner::from_bytes(&B256::repeat_byte(0x22)).unwrap();
        let input = signed_transfer(&app, &impostor, sender_key().address()).await;

        let (status, body) = send(&app, Method::POST, "/transactions", Some(input)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        let (_, all) = send(&app, Method::GET, "/transactions", None).await;
        assert!(all.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_field_is_named() {
        let app = app(None, true);
        let signer = sender_key();
        let mut input = signed_transfer(&app, &signer, signer.address()).await;
        input.as_object_mut().unwrap().remove("sign");

        let (status, body) = send(&app, Method::POST, "/transactions", Some(input)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("sign"));
    }

    #[tokio::test]
    async fn test_unknown_transfer_is_not_found() {
        let app = app(None, true);
        let id = TransferId::new_v4();
        let (status, _) = send(&app, Method::GET, &format!("/transactions/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/transactions/{id}/execute"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_execute_without_sponsor_is_unavailable() {
        let app = app(None, false);
        let signer = sender_key();
        let input = signed_transfer(&app, &signer, signer.address()).await;
        let (_, created) = send(&app, Method::POST, "/transactions", Some(input)).await;
        let id = created["id"].as_str().unwrap();

        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/transactions/{id}/execute"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let (_, stored) = send(&app, Method::GET, &format!("/transactions/{id}"), None).await;
        assert_eq!(stored["executed"], false);
    }

    #[tokio::test]
    async fn test_reported_execution_without_rpc_is_trusted_once() {
        let app = app(None, false);
        let signer = sender_key();
        let input = signed_transfer(&app, &signer, signer.address()).await;
        let (_, created) = send(&app, Method::POST, "/transactions", Some(input)).await;
        let id = created["id"].clone();
        let tx = B256::repeat_byte(0x77);

        let body = json!({ "transactionId": id, "transactionHash": tx });
        let (status, record) = send(&app, Method::PATCH, "/execute", Some(body.clone())).await;
        assert_eq!(status, StatusCode::OK, "{record}");
        assert_eq!(record["executed"], true);
        assert_eq!(record["transactionHash"], json!(tx));

        let (status, _) = send(&app, Method::PATCH, "/execute", Some(body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_campaigns() {
        let app = app(None, true);
        let owner = Address::repeat_byte(0x0c);
        let campaign = json!({ "id": "launch", "owner": owner, "reserve": "1000000000" });

        let (status, _) = send(&app, Method::POST, "/campaigns", Some(campaign.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, _) = send(&app, Method::POST, "/campaigns", Some(campaign)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, found) = send(&app, Method::GET, "/campaigns?id=launch", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found["reserve"], "1000000000");

        let (status, _) = send(&app, Method::GET, "/campaigns?id=nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, owned) =
            send(&app, Method::GET, &format!("/campaigns?owner={owner}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(owned.as_array().unwrap().len(), 1);

        let (status, _) = send(&app, Method::GET, "/campaigns", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_chains_report_sponsorship() {
        let app = app(Some(FakeChain::default()), true);
        let (status, chains) = send(&app, Method::GET, "/chains", None).await;
        assert_eq!(status, StatusCode::OK);
        let chains = chains.as_array().unwrap();
        let base_sepolia = chains
            .iter()
            .find(|c| c["chainId"] == BASE_SEPOLIA)
            .unwrap();
        assert_eq!(base_sepolia["network"], "eip155:84532");
        assert_eq!(base_sepolia["sponsored"], true);
        assert!(
            chains
                .iter()
                .filter(|c| c["chainId"] != BASE_SEPOLIA)
                .all(|c| c["sponsored"] == false)
        );
    }
}
