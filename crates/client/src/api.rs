use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::models::{
    CreatePollRequest, ErrorBody, Poll, PollSummary, Results, ShareResponse, VoteRequest,
};

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:3000";

pub struct Api {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl Api {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.token.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }

    pub async fn list_polls(&self) -> anyhow::Result<Vec<Poll>> {
        json(self.authed(self.client.get(self.url("/polls")))).await
    }

    pub async fn create_poll(&self, title: &str, options: &[String]) -> anyhow::Result<Poll> {
        let body = CreatePollRequest { title, options };
        json(self.authed(self.client.post(self.url("/polls")).json(&body))).await
    }

    pub async fn vote(&self, poll_id: &str, option_index: usize) -> anyhow::Result<()> {
        let body = VoteRequest {
            poll_id,
            option_index,
        };
        send(self.authed(self.client.post(self.url("/vote")).json(&body))).await?;
        Ok(())
    }

    pub async fn results(&self, poll_id: &str) -> anyhow::Result<Results> {
        let url = self.url(&format!("/polls/{}/results", poll_id));
        json(self.authed(self.client.get(url))).await
    }

    pub async fn share_url(&self, poll_id: &str) -> anyhow::Result<String> {
        let url = self.url(&format!("/polls/{}/share", poll_id));
        let share: ShareResponse = json(self.client.get(url)).await?;
        Ok(share.url)
    }

    pub async fn my_polls(&self) -> anyhow::Result<Vec<PollSummary>> {
        json(self.authed(self.client.get(self.url("/me/polls")))).await
    }

    pub async fn delete_poll(&self, poll_id: &str) -> anyhow::Result<()> {
        let url = self.url(&format!("/polls/{}", poll_id));
        send(self.authed(self.client.delete(url))).await?;
        Ok(())
    }

    /// Opens the poll's event stream. Read it with [`Response::chunk`].
    pub async fn events(&self, poll_id: &str) -> anyhow::Result<Response> {
        let url = self.url(&format!("/polls/{}/events", poll_id));
        send(self.client.get(url).header("Accept", "text/event-stream")).await
    }
}

async fn send(request: RequestBuilder) -> anyhow::Result<Response> {
    let response = request.send().await?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await?;
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.error)
            .unwrap_or(text);
        anyhow::bail!("{} ({})", message, status);
    }

    Ok(response)
}

async fn json<T: DeserializeOwned>(request: RequestBuilder) -> anyhow::Result<T> {
    Ok(send(request).await?.json().await?)
}
