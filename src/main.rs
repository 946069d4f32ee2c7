use callcore::application::{CallContext, CallOrchestrator, DialOptions};
use callcore::config::Config;
use callcore::domain::call::{CallKind, ConferenceState, RunningState, VideoState};
use callcore::domain::ports::IncomingCallInfo;
use callcore::domain::shared::value_objects::CallId;
use callcore::infrastructure::{LoopbackBearer, MetricsObserver, TracingObserver};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;

    // Initialize tracing; RUST_LOG wins over the configured filter
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.filter))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting callcore");
    info!("Configuration loaded: {:?}", config);

    let (bearer, network) = LoopbackBearer::new(Duration::from_millis(50));
    let bearer = Arc::new(bearer);
    let context = CallContext::new(config)
        .with_bearer(bearer.clone())
        .with_companion(bearer.clone())
        .with_observer(Arc::new(TracingObserver::new()))
        .with_observer(Arc::new(MetricsObserver::new()));
    let orchestrator = Arc::new(CallOrchestrator::new(context));
    let network_task = network.spawn(orchestrator.clone());

    demo_call_session(&orchestrator, &bearer).await?;

    bearer.shutdown();
    network_task.await?;
    info!("callcore stopped");
    Ok(())
}

async fn demo_call_session(orchestrator: &CallOrchestrator, bearer: &LoopbackBearer) -> anyhow::Result<()> {
    info!("=== Call Session Demo ===");

    // Outgoing call
    let first = orchestrator
        .dial_call("10086", DialOptions::new(CallKind::Cs))?
        .sent()
        .ok_or_else(|| anyhow::anyhow!("dial was deferred"))?;
    wait_for_state(orchestrator, first, RunningState::Active).await?;
    info!("Call {} connected", first);

    // Waiting call, answered; the first call goes on hold
    let second = bearer
        .inject_incoming(IncomingCallInfo::new("13900000000", CallKind::Cs))
        .await?;
    orchestrator.answer_call(None, VideoState::Voice)?;
    wait_for_state(orchestrator, second, RunningState::Active).await?;
    wait_for_state(orchestrator, first, RunningState::Holding).await?;
    info!("Call {} answered, call {} held", second, first);

    // Swap them back
    orchestrator.switch_call(second)?;
    wait_for_state(orchestrator, first, RunningState::Active).await?;
    info!("Switched to call {}", first);

    // Conference
    orchestrator.combine_conference(first)?;
    wait_for_conference(orchestrator, CallKind::Cs, ConferenceState::Active).await?;
    info!(
        "Conference up: main {:?}, subs {:?}",
        orchestrator.get_main_call_id(first)?,
        orchestrator.get_sub_call_id_list(first)?
    );

    orchestrator.separate_conference(second)?;
    wait_for_conference(orchestrator, CallKind::Cs, ConferenceState::Idle).await?;
    info!("Call {} separated", second);

    orchestrator.start_dtmf(second, '5')?;
    orchestrator.stop_dtmf(second)?;

    let calls = orchestrator.get_all_calls();
    println!("{}", serde_json::to_string_pretty(&calls)?);

    // Tear down
    for call in calls {
        orchestrator.hang_up_call(Some(call.call_id))?;
    }
    wait_until(|| orchestrator.registry().is_empty()).await?;
    info!("All calls ended");
    Ok(())
}

async fn wait_for_state(orchestrator: &CallOrchestrator, call_id: CallId, state: RunningState) -> anyhow::Result<()> {
    wait_until(|| {
        orchestrator
            .get_call_snapshot(call_id)
            .map_or(false, |call| call.running_state == state)
    })
    .await
    .map_err(|_| anyhow::anyhow!("call {} never reached {}", call_id, state))
}

async fn wait_for_conference(orchestrator: &CallOrchestrator, kind: CallKind, state: ConferenceState) -> anyhow::Result<()> {
    wait_until(|| orchestrator.conference_state(kind) == state)
        .await
        .map_err(|_| anyhow::anyhow!("{} conference never reached {:?}", kind, state))
}

async fn wait_until<F>(mut done: F) -> anyhow::Result<()>
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(SETTLE_TIMEOUT, async {
        while !done() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;
    Ok(())
}
