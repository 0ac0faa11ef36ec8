use {
    crate::{domain::WalletAddress, engine::EngineStatus, traits::ClaimLedger},
    axum::{
        Json,
        Router,
        extract::{Path, State as AxumState},
        http::StatusCode,
    },
    chrono::{DateTime, Utc},
    serde::Serialize,
    std::{future::Future, sync::Arc},
    tokio::{net::TcpListener, sync::watch},
    tower_http::{cors::CorsLayer, trace::TraceLayer},
};

/// Which collaborators could be built from the configuration.
#[derive(Clone, Copy, Debug, Default)]
pub struct Components {
    pub ledger: bool,
    pub log_source: bool,
    pub payout: bool,
    pub contract_address: bool,
}

#[derive(Clone)]
pub struct State {
    status: watch::Receiver<EngineStatus>,
    ledger: Option<Arc<dyn ClaimLedger>>,
    components: Components,
    missing_config: Vec<&'static str>,
}

impl State {
    pub fn new(
        status: watch::Receiver<EngineStatus>,
        ledger: Option<Arc<dyn ClaimLedger>>,
        components: Components,
        missing_config: &[&'static str],
    ) -> Self {
        Self {
            status,
            ledger,
            components,
            missing_config: missing_config.to_vec(),
        }
    }
}

pub fn router(state: State) -> Router {
    Router::new()
        .route("/health", axum::routing::get(health))
        .route("/eligible/{address}", axum::routing::get(eligible))
        .with_state(state)
        .merge(observe::metrics::handle_metrics())
        // Queried straight from the browser by the claim page.
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(
    listener: TcpListener,
    state: State,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    tracing::info!(addr = ?listener.local_addr(), "serving HTTP API");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Health {
    status: &'static str,
    timestamp: DateTime<Utc>,
    ledger: bool,
    log_source: bool,
    payout: bool,
    contract_address: bool,
    scanning: bool,
    processed_count: usize,
    pending_retries: usize,
    last_processed_block: Option<u64>,
    last_cycle_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    missing_config: Vec<&'static str>,
}

/// Always answers, also when the service is not configured to scan.
async fn health(AxumState(state): AxumState<State>) -> Json<Health> {
    let status = state.status.borrow().clone();
    Json(Health {
        status: "online",
        timestamp: Utc::now(),
        ledger: state.components.ledger,
        log_source: state.components.log_source,
        payout: state.components.payout,
        contract_address: state.components.contract_address,
        scanning: status.enabled,
        processed_count: status.processed_count,
        pending_retries: status.pending_retries,
        last_processed_block: status.last_processed_block,
        last_cycle_at: status.last_cycle_at,
        last_error: status.last_error,
        missing_config: state.missing_config.clone(),
    })
}

#[derive(Debug, Serialize)]
struct Eligibility {
    eligible: bool,
}

/// A wallet counts as eligible once a claim has been recorded for it.
async fn eligible(
    Path(address): Path<String>,
    AxumState(state): AxumState<State>,
) -> (StatusCode, Json<Eligibility>) {
    let not_eligible = |code: StatusCode| (code, Json(Eligibility { eligible: false }));

    let Ok(wallet) = address.parse::<WalletAddress>() else {
        return not_eligible(StatusCode::BAD_REQUEST);
    };
    let Some(ledger) = &state.ledger else {
        tracing::warn!("eligibility requested but no ledger is configured");
        return not_eligible(StatusCode::INTERNAL_SERVER_ERROR);
    };
    match ledger.exists(&wallet).await {
        Ok(eligible) => (StatusCode::OK, Json(Eligibility { eligible })),
        Err(err) => {
            tracing::warn!(?err, %wallet, "failed to look up claim");
            not_eligible(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{domain::ClaimRecord, infra::ledger::InMemoryLedger, traits::MockClaimLedger},
        anyhow::anyhow,
        axum::{body::Body, http::Request, response::Response},
        serde_json::{Value, json},
        tower::ServiceExt,
    };

    const USER: &str = "0xabc0000000000000000000000000000000000001";

    fn state(ledger: Option<Arc<dyn ClaimLedger>>, status: EngineStatus) -> State {
        let (_, receiver) = watch::channel(status);
        State::new(
            receiver,
            ledger.clone(),
            Components {
                ledger: ledger.is_some(),
                ..Default::default()
            },
            &["NODE_URL", "PRIVATE_KEY"],
        )
    }

    fn claimed_ledger() -> Arc<dyn ClaimLedger> {
        Arc::new(InMemoryLedger::with_claims([ClaimRecord {
            wallet: USER.parse().unwrap(),
            claimed_at: Utc::now(),
            tx_hash: "0x01".to_string(),
        }]))
    }

    async fn get(state: State, uri: &str) -> Response {
        router(state)
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_in_degraded_mode() {
        let response = get(state(None, EngineStatus::default()), "/health").await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "online");
        assert_eq!(body["ledger"], false);
        assert_eq!(body["scanning"], false);
        assert_eq!(body["processedCount"], 0);
        assert_eq!(body["lastProcessedBlock"], Value::Null);
        assert_eq!(body["missingConfig"], json!(["NODE_URL", "PRIVATE_KEY"]));
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn health_reports_engine_status() {
        let status = EngineStatus {
            enabled: true,
            last_processed_block: Some(140),
            processed_count: 2,
            pending_retries: 1,
            last_cycle_at: Some(Utc::now()),
            last_error: Some("log source unavailable".to_string()),
        };

        let body = json_body(get(state(Some(claimed_ledger()), status), "/health").await).await;

        assert_eq!(body["ledger"], true);
        assert_eq!(body["scanning"], true);
        assert_eq!(body["lastProcessedBlock"], 140);
        assert_eq!(body["processedCount"], 2);
        assert_eq!(body["pendingRetries"], 1);
        assert_eq!(body["lastError"], "log source unavailable");
    }

    #[tokio::test]
    async fn eligible_for_claimed_wallet_in_any_casing() {
        let state = state(Some(claimed_ledger()), EngineStatus::default());

        for address in [USER, "0xABC0000000000000000000000000000000000001"] {
            let response = get(state.clone(), &format!("/eligible/{address}")).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(json_body(response).await, json!({ "eligible": true }));
        }

        let response = get(
            state,
            "/eligible/0x0000000000000000000000000000000000000002",
        )
        .await;
        assert_eq!(json_body(response).await, json!({ "eligible": false }));
    }

    #[tokio::test]
    async fn eligible_rejects_malformed_address() {
        let response = get(
            state(Some(claimed_ledger()), EngineStatus::default()),
            "/eligible/0x1234",
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await, json!({ "eligible": false }));
    }

    #[tokio::test]
    async fn eligible_fails_without_working_ledger() {
        let mut ledger = MockClaimLedger::new();
        ledger
            .expect_exists()
            .times(1)
            .returning(|_| Err(anyhow!("connection refused")));
        let response = get(
            state(Some(Arc::new(ledger)), EngineStatus::default()),
            &format!("/eligible/{USER}"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await, json!({ "eligible": false }));

        let response = get(
            state(None, EngineStatus::default()),
            &format!("/eligible/{USER}"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn serves_metrics() {
        let response = get(state(None, EngineStatus::default()), "/metrics").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn allows_cross_origin_requests() {
        let response = router(state(None, EngineStatus::default()))
            .oneshot(
                Request::get("/health")
                    .header("origin", "https://claim.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()["access-control-allow-origin"], "*");
    }
}
