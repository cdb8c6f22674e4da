use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{ClientError, GroupSource};
use crate::common::ApiResponse;
use crate::models::{
    AddMemberRequest, AddMemberResponse, CreateGroupRequest, Group, GroupCount,
    LeaveGroupRequest, LoginRequest, LoginResponse, Member, RegisterRequest,
    UpdatePriceRequest, User,
};

/// HTTP 客户端，解开 `{code, msg, resp_data}` 外壳
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// `base_url` 包含 API 前缀，例如 `http://127.0.0.1:3000/api`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let mut req = self.http.get(self.url(path));
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        unwrap_envelope(req.send().await?).await
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let mut req = self.http.request(method, self.url(path)).json(body);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        unwrap_envelope(req.send().await?).await
    }

    pub async fn create_group(&self, req: &CreateGroupRequest) -> Result<Group, ClientError> {
        self.send_json(reqwest::Method::POST, "/groups", req).await
    }

    pub async fn list_groups(&self) -> Result<Vec<Group>, ClientError> {
        self.get("/groups").await
    }

    pub async fn get_group(&self, group_id: i64) -> Result<Group, ClientError> {
        self.get(&format!("/groups/{}", group_id)).await
    }

    pub async fn member_count(&self, group_id: i64) -> Result<GroupCount, ClientError> {
        self.get(&format!("/groups/{}/count", group_id)).await
    }

    pub async fn delete_group(&self, group_id: i64) -> Result<(), ClientError> {
        let resp = self
            .http
            .delete(self.url(&format!("/groups/{}", group_id)))
            .send()
            .await?;
        unwrap_envelope::<serde_json::Value>(resp).await.map(|_| ())
    }

    pub async fn update_price(&self, group_id: i64, total_cost: f64) -> Result<Group, ClientError> {
        self.send_json(
            reqwest::Method::PUT,
            &format!("/groups/price/{}", group_id),
            &UpdatePriceRequest { total_cost },
        )
        .await
    }

    pub async fn add_member(
        &self,
        req: &AddMemberRequest,
    ) -> Result<AddMemberResponse, ClientError> {
        self.send_json(reqwest::Method::POST, "/members", req).await
    }

    pub async fn list_members(&self, group_id: i64) -> Result<Vec<Member>, ClientError> {
        self.get(&format!("/members/group/{}", group_id)).await
    }

    pub async fn leave_group(&self, group_id: i64, user_id: i64) -> Result<(), ClientError> {
        self.send_json::<_, serde_json::Value>(
            reqwest::Method::POST,
            "/members/leave_user",
            &LeaveGroupRequest { group_id, user_id },
        )
        .await
        .map(|_| ())
    }

    pub async fn remove_member(&self, member_id: i64) -> Result<Member, ClientError> {
        let resp = self
            .http
            .delete(self.url(&format!("/members/{}", member_id)))
            .send()
            .await?;
        unwrap_envelope(resp).await
    }

    pub async fn register(&self, req: &RegisterRequest) -> Result<User, ClientError> {
        self.send_json(reqwest::Method::POST, "/auth/register", req).await
    }

    /// 登录成功后返回带 token 的新客户端
    pub async fn login(&self, req: &LoginRequest) -> Result<(Self, LoginResponse), ClientError> {
        let resp: LoginResponse = self
            .send_json(reqwest::Method::POST, "/auth/login", req)
            .await?;
        Ok((self.clone().with_token(resp.token.clone()), resp))
    }

    pub async fn me(&self) -> Result<User, ClientError> {
        self.get("/auth/me").await
    }
}

async fn unwrap_envelope<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
    let status = resp.status();
    let envelope: ApiResponse<T> = resp.json().await?;

    if !envelope.is_success() {
        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(envelope.msg));
        }
        return Err(ClientError::Api {
            code: envelope.code,
            msg: envelope.msg,
        });
    }

    envelope.resp_data.ok_or(ClientError::Api {
        code: envelope.code,
        msg: "Response carried no data".into(),
    })
}

#[async_trait]
impl GroupSource for ApiClient {
    async fn fetch_group(&self, group_id: i64) -> Result<Group, ClientError> {
        self.get_group(group_id).await
    }

    async fn fetch_members(&self, group_id: i64) -> Result<Vec<Member>, ClientError> {
        self.list_members(group_id).await
    }
}
