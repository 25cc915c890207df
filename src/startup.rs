use crate::components::{
    CalendarProvider, ComposioClient, GoogleCalendarClient, GoogleOAuth, InMemoryStore,
    RedisStore, SessionStore, Summarizer, TokenHandle, UnconfiguredSummarizer,
};
use crate::config::{CalendarBackend, Config};
use crate::error::{config_error, Error};
use crate::service::DashboardService;
use crate::shutdown;
use crate::web::auth::{AuthConfig, AuthService};
use crate::web::{self, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize logging with environment-based configuration
pub fn init_logging() -> miette::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Other(format!("Failed to set up logging: {}", e)))?;

    Ok(())
}

/// Load the application config
pub fn load_config() -> miette::Result<Config> {
    match Config::load() {
        Ok(config) => Ok(config),
        Err(e) => {
            error!("Failed to load configuration: {:?}", e);
            Err(e.into())
        }
    }
}

/// Everything the server needs, plus background handles to stop on shutdown
pub struct Application {
    pub state: AppState,
    pub token_handle: Option<TokenHandle>,
}

/// Connect to Redis, falling back to memory when it is unreachable
async fn connect_store(redis_url: &str) -> Arc<dyn SessionStore> {
    match RedisStore::connect(redis_url).await {
        Ok(store) => {
            info!("Connected to Redis successfully");
            Arc::new(store)
        }
        Err(e) => {
            error!("Failed to connect to Redis: {}", e);
            warn!("Using in-memory session store; sessions will not survive a restart");
            Arc::new(InMemoryStore::default())
        }
    }
}

#[cfg(feature = "assistant")]
fn build_summarizer(config: &Config) -> Arc<dyn Summarizer> {
    use crate::components::AssistantSummarizer;

    match &config.assistant_api_key {
        Some(api_key) => {
            info!("Assistant enabled with model {}", config.assistant_model);
            Arc::new(AssistantSummarizer::new(
                api_key,
                &config.assistant_model,
                config.assistant_base_url.as_deref(),
            ))
        }
        None => {
            warn!("OPENAI_API_KEY not set; chat is disabled");
            Arc::new(UnconfiguredSummarizer)
        }
    }
}

#[cfg(not(feature = "assistant"))]
fn build_summarizer(_config: &Config) -> Arc<dyn Summarizer> {
    warn!("Built without the assistant feature; chat is disabled");
    Arc::new(UnconfiguredSummarizer)
}

/// Wire the store, provider, summarizer and auth into the app state
pub async fn build_application(config: &Config) -> miette::Result<Application> {
    let tz = config.tz()?;
    let store = connect_store(&config.redis_url).await;

    let google_oauth = config.google.clone().map(GoogleOAuth::new);
    let composio = config
        .composio
        .clone()
        .map(|settings| Arc::new(ComposioClient::new(settings)));

    let mut token_handle = None;
    let provider: Arc<dyn CalendarProvider> = match config.calendar_backend {
        CalendarBackend::Google => {
            let oauth = google_oauth
                .clone()
                .ok_or_else(|| config_error("Google OAuth is not configured"))?;
            let tokens = TokenHandle::spawn(oauth, Arc::clone(&store));
            token_handle = Some(tokens.clone());
            Arc::new(GoogleCalendarClient::new(tokens, Arc::clone(&store)))
        }
        CalendarBackend::Composio => composio
            .clone()
            .ok_or_else(|| config_error("Integration broker is not configured"))?,
    };
    info!("Using {} calendar backend", provider.name());

    let service = DashboardService::new(
        provider,
        build_summarizer(config),
        config.display.clone(),
        tz,
    );

    let auth = Arc::new(AuthService::new(AuthConfig {
        jwt_secret: config.jwt_secret.clone(),
        token_expiration_minutes: config.token_expiration_minutes,
    }));

    Ok(Application {
        state: AppState {
            service,
            store,
            auth,
            google_oauth,
            composio,
        },
        token_handle,
    })
}

/// Bind the listener and serve until a shutdown signal arrives
pub async fn start_server(config: Config) -> miette::Result<()> {
    let application = build_application(&config).await?;
    let app = web::router(application.state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(Error::from)?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::shutdown_signal(application.token_handle))
        .await
        .map_err(Error::from)?;

    info!("Server stopped");
    Ok(())
}
