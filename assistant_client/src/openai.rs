//! [`AssistantBackend`] over an Assistants-v2 style REST API.
//!
//! Agents map to `/assistants`, conversations to `/threads`, messages and runs to
//! the thread's sub-resources.

use async_trait::async_trait;
use reqwest::{Client, Response, header};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use shared_utils::env::get_env_var;
use snafu::ResultExt;
use tracing::debug;

use crate::{
    backend::{
        ApiSnafu, AssistantBackend, BackendError, BackendInitError, ClientBuildSnafu,
        InvalidApiKeySnafu, MissingEnvVarSnafu, RequestSnafu,
    },
    models::{AgentId, AgentSpec, ConversationId, Message, Order, Role, Run, RunId},
};

pub const BASE_URL: &str = "https://api.openai.com/v1";
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Deserialize)]
struct Created {
    id: String,
}

#[derive(Deserialize)]
struct MessageList {
    data: Vec<MessageObject>,
}

#[derive(Deserialize)]
struct MessageObject {
    role: Role,
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: TextValue },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct TextValue {
    value: String,
}

#[derive(Serialize)]
struct CreateAgentBody<'a> {
    name: &'a str,
    instructions: &'a str,
    model: &'a str,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl From<MessageObject> for Message {
    fn from(object: MessageObject) -> Self {
        // First text part only; images and file citations carry no reply text.
        let text = object
            .content
            .into_iter()
            .find_map(|part| match part {
                ContentPart::Text { text } => Some(text.value),
                ContentPart::Other => None,
            })
            .unwrap_or_default();
        Message {
            role: object.role,
            text,
        }
    }
}

pub struct OpenAiAssistants {
    client: Client,
    base_url: String,
}

impl OpenAiAssistants {
    /// Creates a client against the public endpoint.
    ///
    /// Reads the API key from the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self, BackendInitError> {
        Self::from_env_var(API_KEY_ENV, BASE_URL)
    }

    /// Like [`from_env`](Self::from_env) with a custom key variable and base URL.
    pub fn from_env_var(var: &str, base_url: &str) -> Result<Self, BackendInitError> {
        let api_key = SecretString::new(get_env_var(var).context(MissingEnvVarSnafu)?.into());
        Self::new(api_key, base_url)
    }

    /// The key only lives on in the client's sensitive `Authorization` header.
    pub fn new(api_key: SecretString, base_url: &str) -> Result<Self, BackendInitError> {
        let mut auth = header::HeaderValue::from_str(&format!("Bearer {}", api_key.expose_secret()))
            .context(InvalidApiKeySnafu)?;
        auth.set_sensitive(true);

        let mut headers = header::HeaderMap::new();
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert("OpenAI-Beta", header::HeaderValue::from_static("assistants=v2"));

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .context(ClientBuildSnafu)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, BackendError> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .context(RequestSnafu)?;
        decode(response).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, BackendError> {
        let response = self
            .client
            .get(self.url(path))
            .query(query)
            .send()
            .await
            .context(RequestSnafu)?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown API error".to_string());
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .map(|envelope| envelope.error.message)
            .unwrap_or(body);
        return ApiSnafu {
            status: status.as_u16(),
            message,
        }
        .fail();
    }
    response.json::<T>().await.context(RequestSnafu)
}

#[async_trait]
impl AssistantBackend for OpenAiAssistants {
    async fn create_agent(&self, spec: &AgentSpec) -> Result<AgentId, BackendError> {
        let body = CreateAgentBody {
            name: &spec.name,
            instructions: &spec.instructions,
            model: &spec.model,
        };
        let created: Created = self.post_json("/assistants", &body).await?;
        debug!(agent = %created.id, model = %spec.model, "created assistant");
        Ok(AgentId(created.id))
    }

    async fn create_conversation(&self) -> Result<ConversationId, BackendError> {
        let created: Created = self.post_json("/threads", &json!({})).await?;
        Ok(ConversationId(created.id))
    }

    async fn post_message(
        &self,
        conversation: &ConversationId,
        role: Role,
        text: &str,
    ) -> Result<(), BackendError> {
        let path = format!("/threads/{conversation}/messages");
        let _: Created = self
            .post_json(&path, &json!({ "role": role, "content": text }))
            .await?;
        Ok(())
    }

    async fn start_run(
        &self,
        conversation: &ConversationId,
        agent: &AgentId,
    ) -> Result<Run, BackendError> {
        let path = format!("/threads/{conversation}/runs");
        self.post_json(&path, &json!({ "assistant_id": agent })).await
    }

    async fn retrieve_run(
        &self,
        conversation: &ConversationId,
        run: &RunId,
    ) -> Result<Run, BackendError> {
        self.get_json(&format!("/threads/{conversation}/runs/{run}"), &[])
            .await
    }

    async fn list_messages(
        &self,
        conversation: &ConversationId,
        order: Order,
    ) -> Result<Vec<Message>, BackendError> {
        let path = format!("/threads/{conversation}/messages");
        let list: MessageList = self
            .get_json(&path, &[("order", order.as_str())])
            .await?;
        Ok(list.data.into_iter().map(Message::from).collect())
    }
}
