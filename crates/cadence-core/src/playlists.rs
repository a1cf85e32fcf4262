//! Playlist service client and the in-memory list kept for one owner.
//!
//! Mutations are request/response only: the local list changes after the
//! server answers, and always to the representation the server returned.
//! A failed call leaves the list as it was and hands the error back.

use tracing::{info, warn};

use crate::config::BackendConfig;
use crate::error::ApiError;
use crate::http::{build_client, send_empty, send_json, ADMIN_HEADER, USER_HEADER};
use crate::model::{PlaylistDto, PlaylistRequest};

#[derive(Clone)]
pub struct PlaylistClient {
    http: reqwest::Client,
    base: String,
}

impl PlaylistClient {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            http: build_client(config.request_timeout()),
            base: config.endpoint("/api/playlists"),
        }
    }

    fn url(&self, path: &str) -> String {
        if path.is_empty() {
            self.base.clone()
        } else {
            format!("{}/{}", self.base, path.trim_start_matches('/'))
        }
    }

    fn authed(&self, req: reqwest::RequestBuilder, owner: &Owner) -> reqwest::RequestBuilder {
        req.header(USER_HEADER, owner.user_id.as_str())
            .header(ADMIN_HEADER, if owner.is_admin { "true" } else { "false" })
    }

    pub async fn create(
        &self,
        request: &PlaylistRequest,
        owner: &Owner,
    ) -> Result<PlaylistDto, ApiError> {
        let url = self.url("");
        let req = self.authed(self.http.post(&url), owner).json(request);
        send_json(req, &url).await
    }

    pub async fn update(
        &self,
        playlist_id: &str,
        request: &PlaylistRequest,
        owner: &Owner,
    ) -> Result<PlaylistDto, ApiError> {
        let url = self.url(playlist_id);
        let req = self.authed(self.http.put(&url), owner).json(request);
        send_json(req, &url).await
    }

    pub async fn delete(&self, playlist_id: &str, owner: &Owner) -> Result<(), ApiError> {
        let url = self.url(playlist_id);
        let req = self.authed(self.http.delete(&url), owner);
        send_empty(req, &url).await
    }

    pub async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<PlaylistDto>, ApiError> {
        let url = self.url(&format!("user/{}", owner_id));
        send_json(self.http.get(&url), &url).await
    }

    pub async fn list_public(&self) -> Result<Vec<PlaylistDto>, ApiError> {
        let url = self.url("public");
        send_json(self.http.get(&url), &url).await
    }

    pub async fn get_public(&self, playlist_id: &str) -> Result<PlaylistDto, ApiError> {
        let url = self.url(&format!("public/{}", playlist_id));
        send_json(self.http.get(&url), &url).await
    }

    pub async fn add_track(
        &self,
        playlist_id: &str,
        track_id: &str,
        owner: &Owner,
    ) -> Result<PlaylistDto, ApiError> {
        let url = self.url(&format!("{}/tracks/{}", playlist_id, track_id));
        let req = self.authed(self.http.post(&url), owner);
        send_json(req, &url).await
    }

    pub async fn remove_track(
        &self,
        playlist_id: &str,
        track_id: &str,
        owner: &Owner,
    ) -> Result<PlaylistDto, ApiError> {
        let url = self.url(&format!("{}/tracks/{}", playlist_id, track_id));
        let req = self.authed(self.http.delete(&url), owner);
        send_json(req, &url).await
    }
}

/// Opaque identity threaded through every mutating call.
#[derive(Debug, Clone, PartialEq)]
pub struct Owner {
    pub user_id: String,
    pub is_admin: bool,
}

impl Owner {
    pub fn from_config(config: &BackendConfig) -> Self {
        Self {
            user_id: config.user_id.clone(),
            is_admin: config.is_admin,
        }
    }
}

/// The owner's playlists as last confirmed by the server.
pub struct PlaylistStore {
    client: PlaylistClient,
    owner: Owner,
    playlists: Vec<PlaylistDto>,
}

impl PlaylistStore {
    pub fn new(client: PlaylistClient, owner: Owner) -> Self {
        Self {
            client,
            owner,
            playlists: Vec::new(),
        }
    }

    pub fn playlists(&self) -> &[PlaylistDto] {
        &self.playlists
    }

    pub fn get(&self, playlist_id: &str) -> Option<&PlaylistDto> {
        self.playlists.iter().find(|p| p.id == playlist_id)
    }

    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    pub async fn refresh(&mut self) -> Result<&[PlaylistDto], ApiError> {
        let fresh = self
            .client
            .list_for_owner(&self.owner.user_id)
            .await
            .inspect_err(|e| warn!("playlists: refresh failed: {}", e))?;
        info!("playlists: loaded {} for {}", fresh.len(), self.owner.user_id);
        self.playlists = fresh;
        Ok(&self.playlists)
    }

    pub async fn create(&mut self, request: PlaylistRequest) -> Result<&PlaylistDto, ApiError> {
        let created = self
            .client
            .create(&request, &self.owner)
            .await
            .inspect_err(|e| warn!("playlists: create {:?} failed: {}", request.name, e))?;
        info!("playlists: created {} ({})", created.name, created.id);
        self.playlists.push(created);
        let last = self.playlists.len() - 1;
        Ok(&self.playlists[last])
    }

    pub async fn update(
        &mut self,
        playlist_id: &str,
        request: PlaylistRequest,
    ) -> Result<&PlaylistDto, ApiError> {
        let updated = self
            .client
            .update(playlist_id, &request, &self.owner)
            .await
            .inspect_err(|e| warn!("playlists: update {} failed: {}", playlist_id, e))?;
        Ok(self.replace(playlist_id, updated))
    }

    pub async fn delete(&mut self, playlist_id: &str) -> Result<(), ApiError> {
        self.client
            .delete(playlist_id, &self.owner)
            .await
            .inspect_err(|e| warn!("playlists: delete {} failed: {}", playlist_id, e))?;
        self.playlists.retain(|p| p.id != playlist_id);
        info!("playlists: deleted {}", playlist_id);
        Ok(())
    }

    pub async fn add_track(
        &mut self,
        playlist_id: &str,
        track_id: &str,
    ) -> Result<&PlaylistDto, ApiError> {
        let updated = self
            .client
            .add_track(playlist_id, track_id, &self.owner)
            .await
            .inspect_err(|e| {
                warn!("playlists: add {} to {} failed: {}", track_id, playlist_id, e)
            })?;
        Ok(self.replace(playlist_id, updated))
    }

    pub async fn remove_track(
        &mut self,
        playlist_id: &str,
        track_id: &str,
    ) -> Result<&PlaylistDto, ApiError> {
        let updated = self
            .client
            .remove_track(playlist_id, track_id, &self.owner)
            .await
            .inspect_err(|e| {
                warn!("playlists: remove {} from {} failed: {}", track_id, playlist_id, e)
            })?;
        Ok(self.replace(playlist_id, updated))
    }

    /// Swap in the server's copy; append when it was not known locally.
    fn replace(&mut self, playlist_id: &str, updated: PlaylistDto) -> &PlaylistDto {
        let idx = match self.playlists.iter().position(|p| p.id == playlist_id) {
            Some(idx) => {
                self.playlists[idx] = updated;
                idx
            }
            None => {
                self.playlists.push(updated);
                self.playlists.len() - 1
            }
        };
        &self.playlists[idx]
    }
}
