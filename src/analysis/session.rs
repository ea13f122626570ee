//! One-time bootstrap of the OpenAI client, vector store, and assistant.
//!
//! The handles are created on first use (or eagerly through [`AssistantSession::get`] at
//! startup) and then shared by every request. Each handle sits in its own
//! `tokio::sync::OnceCell`, so concurrent first requests wait on a single in-flight
//! initialization and a failed step is retried alone: a vector store that was already created
//! is kept when only the assistant step fails.

use crate::{
    analysis::{
        prompts::{ASSISTANT_INSTRUCTIONS, VECTOR_STORE_EXPIRY_DAYS},
        types::AnalysisError,
    },
    config::Config,
    openai::{Assistant, AssistantSpec, OpenAiClient, VectorStore},
};
use tokio::sync::OnceCell;

/// Long-lived handles shared by every request.
#[derive(Clone)]
pub struct Session {
    /// Authenticated API client.
    pub client: OpenAiClient,
    /// Vector store that receives uploads.
    pub vector_store: VectorStore,
    /// Assistant whose file search tool reads `vector_store`.
    pub assistant: Assistant,
}

/// Lazily bootstrapped [`Session`] guarded by one-time initializers.
pub struct AssistantSession {
    config: Config,
    client: OnceCell<OpenAiClient>,
    vector_store: OnceCell<VectorStore>,
    session: OnceCell<Session>,
}

impl AssistantSession {
    /// Prepare a session from configuration without contacting the provider.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            client: OnceCell::new(),
            vector_store: OnceCell::new(),
            session: OnceCell::new(),
        }
    }

    /// Return the shared session, bootstrapping whatever is still missing.
    pub async fn get(&self) -> Result<&Session, AnalysisError> {
        self.session.get_or_try_init(|| self.bootstrap()).await
    }

    /// Return the authenticated client without touching the vector store or assistant.
    pub async fn client(&self) -> Result<&OpenAiClient, AnalysisError> {
        self.client
            .get_or_try_init(|| async {
                let api_key = self.config.require_api_key()?;
                let client = OpenAiClient::new(&self.config.openai_base_url, api_key)?;
                tracing::info!("OpenAI client initialized");
                Ok::<_, AnalysisError>(client)
            })
            .await
    }

    /// Whether bootstrap has already completed.
    pub fn is_ready(&self) -> bool {
        self.session.initialized()
    }

    async fn bootstrap(&self) -> Result<Session, AnalysisError> {
        tracing::info!(
            store_ready = self.vector_store.initialized(),
            "Bootstrapping assistant session"
        );
        let client = self.client().await?.clone();
        let vector_store = self
            .vector_store
            .get_or_try_init(|| prepare_vector_store(&self.config, &client))
            .await?
            .clone();
        let assistant = prepare_assistant(&self.config, &client, &vector_store).await?;

        Ok(Session {
            client,
            vector_store,
            assistant,
        })
    }
}

async fn prepare_vector_store(
    config: &Config,
    client: &OpenAiClient,
) -> Result<VectorStore, AnalysisError> {
    let store = match &config.vector_store_id {
        Some(id) => {
            let store = client.retrieve_vector_store(id).await?;
            tracing::info!(vector_store_id = %store.id, "Reusing existing vector store");
            store
        }
        None => {
            let store = client
                .create_vector_store(&config.vector_store_name, VECTOR_STORE_EXPIRY_DAYS)
                .await?;
            tracing::info!(
                vector_store_id = %store.id,
                name = %config.vector_store_name,
                "Created vector store; set VECTOR_STORE_ID to reuse it"
            );
            store
        }
    };
    Ok(store)
}

async fn prepare_assistant(
    config: &Config,
    client: &OpenAiClient,
    vector_store: &VectorStore,
) -> Result<Assistant, AnalysisError> {
    let assistant = match &config.assistant_id {
        Some(id) => {
            let assistant = client.retrieve_assistant(id).await?;
            if !assistant.searches_vector_store(&vector_store.id) {
                tracing::warn!(
                    assistant_id = %assistant.id,
                    vector_store_id = %vector_store.id,
                    "Reused assistant is not bound to the configured vector store"
                );
            }
            tracing::info!(assistant_id = %assistant.id, model = %assistant.model, "Reusing existing assistant");
            assistant
        }
        None => {
            let spec = AssistantSpec {
                name: config.assistant_name.clone(),
                model: config.assistant_model.clone(),
                instructions: ASSISTANT_INSTRUCTIONS.to_string(),
                vector_store_id: vector_store.id.clone(),
            };
            let assistant = client.create_assistant(&spec).await?;
            tracing::info!(assistant_id = %assistant.id, model = %assistant.model, "Created assistant");
            assistant
        }
    };
    Ok(assistant)
}
