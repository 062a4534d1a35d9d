//! Free-text query forwarding.

use buns_config::Settings;

use crate::client::{AnthropicClient, Message, MessageRequest, ModelClient, QueryError};

/// Instruction placed before every user query.
pub const PREAMBLE: &str =
    "You are Buns, a helpful coding assistant. Help the user with their coding tasks.";

/// Reply used when the model returns no text block.
pub const UNEXPECTED_FORMAT: &str = "Sorry, I received an unexpected response format.";

/// Wrap a user query in the fixed preamble.
pub fn query_prompt(query: &str) -> String {
    format!("{PREAMBLE}\n\nUser query: {query}")
}

/// Build a query for a coding task with optional extra context.
pub fn code_task_prompt(task: &str, context: Option<&str>) -> String {
    let mut prompt = format!("You are a coding assistant. The user wants you to: {task}\n\n");
    if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
        prompt.push_str(&format!("Additional context: {context}\n\n"));
    }
    prompt.push_str(
        "Please provide a helpful response that addresses their request. \
         If code is needed, provide clear, well-commented code examples.",
    );
    prompt
}

/// Human-readable text for a failed query.
pub fn describe_error(error: &QueryError) -> String {
    let message = error.to_string();
    if message.contains("authentication") {
        "Authentication failed. Please check your Anthropic API key.".to_string()
    } else {
        format!("Error: {message}")
    }
}

type Connector = Box<dyn Fn(&str) -> Box<dyn ModelClient> + Send + Sync>;

/// Sends queries to the model, building the client on first use.
pub struct QueryForwarder {
    connect: Connector,
    /// Client and the API key it was built with.
    client: Option<(String, Box<dyn ModelClient>)>,
}

impl Default for QueryForwarder {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryForwarder {
    /// Forwarder backed by [`AnthropicClient`].
    pub fn new() -> Self {
        Self::with_connector(|api_key| Box::new(AnthropicClient::new(api_key)))
    }

    /// Forwarder that builds its client with `connect(api_key)`.
    pub fn with_connector(
        connect: impl Fn(&str) -> Box<dyn ModelClient> + Send + Sync + 'static,
    ) -> Self {
        Self {
            connect: Box::new(connect),
            client: None,
        }
    }

    /// Send `query` and return the reply, or a readable error message.
    pub async fn process_query(&mut self, settings: &Settings, query: &str) -> String {
        match self.try_query(settings, query).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::debug!("Query failed: {e}");
                describe_error(&e)
            }
        }
    }

    /// Send `query`, surfacing failures as [`QueryError`].
    pub async fn try_query(&mut self, settings: &Settings, query: &str) -> Result<String, QueryError> {
        let request = MessageRequest {
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            messages: vec![Message::user(query_prompt(query))],
        };

        let client = self.client_for(settings)?;
        let response = client.complete(&request).await?;

        Ok(response
            .first_text()
            .map(str::to_string)
            .unwrap_or_else(|| UNEXPECTED_FORMAT.to_string()))
    }

    fn client_for(&mut self, settings: &Settings) -> Result<&dyn ModelClient, QueryError> {
        let api_key = settings
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(QueryError::MissingApiKey)?;

        if self
            .client
            .as_ref()
            .is_none_or(|(cached_key, _)| cached_key != api_key)
        {
            tracing::debug!(model = %settings.model, "Creating model client");
            self.client = Some((api_key.to_string(), (self.connect)(api_key)));
        }

        match &self.client {
            Some((_, client)) => Ok(&**client),
            None => Err(QueryError::MissingApiKey),
        }
    }
}
