use std::collections::BTreeMap;

use tokio::sync::{broadcast, oneshot};
use tracing::{info, warn};

use super::{load_json, save_json, BackgroundState};
use crate::domain::{
    AuthResolution, AuthUrlInfo, AuthUrls, AuthorizeRequest, RequestAuthorizeTab,
};
use crate::errors::ValidationError;
use crate::state_machine::{auth_transition, AuthAction, AuthStatus};
use crate::utils::strip_url;

const AUTH_URLS_KEY: &str = "authUrls";

/// Pending authorization prompt. Lives only in memory and is removed as soon as it is resolved.
#[derive(Debug)]
pub struct AuthRequestV2 {
    pub id: String,
    pub id_str: String,
    pub request: RequestAuthorizeTab,
    pub url: String,
    pub status: AuthStatus,
    responder: oneshot::Sender<Result<bool, ValidationError>>,
}

#[derive(Debug, Default)]
pub(crate) struct AuthRequests {
    next_id: u64,
    pending: BTreeMap<String, AuthRequestV2>,
}

impl BackgroundState {
    pub async fn get_auth_list(&self) -> Result<AuthUrls, ValidationError> {
        Ok(load_json(self.stores().authorize.as_ref(), AUTH_URLS_KEY)
            .await?
            .unwrap_or_default())
    }

    pub async fn set_authorize(&self, data: &AuthUrls) -> Result<(), ValidationError> {
        save_json(self.stores().authorize.as_ref(), AUTH_URLS_KEY, data).await?;
        Ok(())
    }

    pub fn num_auth_requests_v2(&self) -> usize {
        self.lock_auth().map(|g| g.pending.len()).unwrap_or(0)
    }

    pub fn all_auth_requests_v2(&self) -> Vec<AuthorizeRequest> {
        match self.lock_auth() {
            Ok(g) => g
                .pending
                .values()
                .map(|r| AuthorizeRequest {
                    id: r.id.clone(),
                    request: r.request.clone(),
                    url: r.url.clone(),
                })
                .collect(),
            Err(e) => {
                warn!("{e}");
                Vec::new()
            }
        }
    }

    pub fn subscribe_auth_requests(&self) -> broadcast::Receiver<Vec<AuthorizeRequest>> {
        self.inner.subjects.auth_requests.subscribe()
    }

    fn publish_auth_requests(&self) {
        let _ = self
            .inner
            .subjects
            .auth_requests
            .send(self.all_auth_requests_v2());
    }

    /// Asks the user whether `url` may see the wallet's accounts.
    ///
    /// Resolves to `false` straight away for an origin that already has a connected record, and
    /// fails for an origin that was denied or already has a prompt open. Otherwise opens a prompt
    /// and resolves once [`resolve_auth_request`](Self::resolve_auth_request) or
    /// [`reject_auth_request`](Self::reject_auth_request) is called for it.
    pub async fn authorize_url_v2(
        &self,
        url: &str,
        request: RequestAuthorizeTab,
    ) -> Result<bool, ValidationError> {
        let auth_list = self.get_auth_list().await?;
        let id_str = strip_url(url)?;

        let decision = {
            let mut g = self.lock_auth()?;
            if g.pending.values().any(|r| r.id_str == id_str) {
                return Err(ValidationError::PendingAuthorization(url.to_owned()));
            }

            if let Some(info) = auth_list.get(&id_str) {
                if !info.is_connected() {
                    return Err(ValidationError::SiteNotAllowed(url.to_owned()));
                }
                return Ok(false);
            }

            let transition = auth_transition(AuthStatus::None, AuthAction::Request)?;
            g.next_id += 1;
            let id = g.next_id.to_string();
            let (responder, decision) = oneshot::channel();
            info!(id = %id, origin = %id_str, reason = transition.reason, "authorization requested");
            g.pending.insert(
                id.clone(),
                AuthRequestV2 {
                    id,
                    id_str,
                    request,
                    url: url.to_owned(),
                    status: transition.to,
                    responder,
                },
            );
            decision
        };
        self.publish_auth_requests();

        decision.await.map_err(|_| {
            ValidationError::Rejected(format!("authorization request for {url} was dropped"))
        })?
    }

    /// Applies the user's decision to a pending prompt.
    pub async fn resolve_auth_request(
        &self,
        id: &str,
        resolution: AuthResolution,
    ) -> Result<(), ValidationError> {
        let request = self.take_auth_request(id)?;
        let action = if resolution.result {
            AuthAction::Allow
        } else {
            AuthAction::Deny
        };
        let outcome = self
            .complete_auth_request(&request, action, &resolution.accounts)
            .await;
        self.publish_auth_requests();
        match outcome {
            Ok(()) => {
                let _ = request.responder.send(Ok(resolution.result));
                Ok(())
            }
            Err(e) => {
                let _ = request.responder.send(Err(e.clone()));
                Err(e)
            }
        }
    }

    /// Dismisses a pending prompt. The origin is recorded as denied and the waiting dApp call
    /// fails with `reason`.
    pub async fn reject_auth_request(&self, id: &str, reason: &str) -> Result<(), ValidationError> {
        let request = self.take_auth_request(id)?;
        let outcome = self
            .complete_auth_request(&request, AuthAction::Deny, &[])
            .await;
        self.publish_auth_requests();
        let _ = request
            .responder
            .send(Err(ValidationError::Rejected(reason.to_owned())));
        outcome
    }

    fn take_auth_request(&self, id: &str) -> Result<AuthRequestV2, ValidationError> {
        let mut g = self.lock_auth()?;
        g.pending
            .remove(id)
            .ok_or_else(|| ValidationError::AuthRequestNotFound(id.to_owned()))
    }

    async fn complete_auth_request(
        &self,
        request: &AuthRequestV2,
        action: AuthAction,
        accounts: &[String],
    ) -> Result<(), ValidationError> {
        let decided = auth_transition(request.status, action)?;
        let is_allowed = decided.to == AuthStatus::Allowed;

        let mut is_allowed_map: BTreeMap<String, bool> = self
            .keyring()
            .accounts()
            .into_iter()
            .map(|pair| (pair.address, false))
            .collect();
        if is_allowed {
            if accounts.is_empty() {
                is_allowed_map.values_mut().for_each(|v| *v = true);
            } else {
                for account in accounts {
                    is_allowed_map.insert(account.clone(), true);
                }
            }
        }

        let mut auth_list = self.get_auth_list().await?;
        auth_list.insert(
            strip_url(&request.url)?,
            AuthUrlInfo {
                count: 0,
                id: request.id_str.clone(),
                is_allowed,
                is_allowed_map,
                origin: request.request.origin.clone(),
                url: request.url.clone(),
                current_evm_network_key: None,
                access_type: request.request.access_type,
            },
        );
        self.set_authorize(&auth_list).await?;

        let persisted = auth_transition(decided.to, AuthAction::Persist)?;
        info!(
            id = %request.id,
            origin = %request.id_str,
            is_allowed,
            reason = persisted.reason,
            "authorization resolved"
        );
        Ok(())
    }

    /// Fails unless `url` has a record with at least one allowed address.
    pub async fn ensure_url_authorized_v2(&self, url: &str) -> Result<bool, ValidationError> {
        let id_str = strip_url(url)?;
        let auth_list = self.get_auth_list().await?;
        let info = auth_list
            .get(&id_str)
            .ok_or_else(|| ValidationError::SiteNotEnabled(url.to_owned()))?;
        if !info.is_connected() {
            return Err(ValidationError::SiteNotAllowed(url.to_owned()));
        }
        Ok(true)
    }

    pub async fn forget_site(&self, url: &str) -> Result<bool, ValidationError> {
        let id_str = strip_url(url)?;
        self.update_auth_list(|list| list.remove(&id_str).is_some())
            .await
    }

    pub async fn forget_all_sites(&self) -> Result<(), ValidationError> {
        self.set_authorize(&AuthUrls::new()).await
    }

    pub async fn toggle_site_access(&self, url: &str, allowed: bool) -> Result<bool, ValidationError> {
        let id_str = strip_url(url)?;
        self.update_auth_list(|list| match list.get_mut(&id_str) {
            Some(info) => {
                info.is_allowed = allowed;
                true
            }
            None => false,
        })
        .await
    }

    pub async fn change_site_account(
        &self,
        url: &str,
        address: &str,
        allowed: bool,
    ) -> Result<bool, ValidationError> {
        let id_str = strip_url(url)?;
        self.update_auth_list(|list| match list.get_mut(&id_str) {
            Some(info) => {
                info.is_allowed_map.insert(address.to_owned(), allowed);
                true
            }
            None => false,
        })
        .await
    }

    pub async fn set_current_evm_network(
        &self,
        url: &str,
        network_key: &str,
    ) -> Result<bool, ValidationError> {
        let id_str = strip_url(url)?;
        self.update_auth_list(|list| match list.get_mut(&id_str) {
            Some(info) => {
                info.current_evm_network_key = Some(network_key.to_owned());
                true
            }
            None => false,
        })
        .await
    }

    /// Read-modify-write of the authorization list; writes only when `edit` reports a change.
    async fn update_auth_list<F>(&self, edit: F) -> Result<bool, ValidationError>
    where
        F: FnOnce(&mut AuthUrls) -> bool,
    {
        let mut list = self.get_auth_list().await?;
        let changed = edit(&mut list);
        if changed {
            self.set_authorize(&list).await?;
        }
        Ok(changed)
    }
}
