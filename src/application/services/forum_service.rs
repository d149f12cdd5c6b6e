use crate::application::dto::{
    CreatePostPayload, CreateReplyPayload, PostDto, ReplyDto, UpdatePostPayload,
    UpdateReplyPayload, Validate,
};
use crate::application::ports::{
    DraftStore, IdentityProvider, ListingCache, Transport, TransportRequest, TransportResponse,
};
use crate::application::services::query::{self, PostFilters, SearchDebouncer};
use crate::application::services::reconcile;
use crate::domain::entities::{CurrentUser, Draft, Post, Reply};
use crate::domain::value_objects::{CacheKey, EntityId};
use crate::shared::error::AppError;
use crate::shared::EngineConfig;
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// The optimistic synchronization engine behind the discussion forum.
///
/// Holds the in-memory post and reply collections, applies mutations locally
/// before the authoritative store confirms them, and reconciles or rolls back
/// when each request resolves. The collections are the only shared mutable
/// state; they are protected by the snapshot/restore discipline plus a
/// per-entity generation counter, not by mutual exclusion across mutations.
pub struct ForumService {
    transport: Arc<dyn Transport>,
    identity: Arc<dyn IdentityProvider>,
    cache: Arc<dyn ListingCache>,
    drafts: Arc<dyn DraftStore>,
    debouncer: SearchDebouncer,
    posts: RwLock<Vec<Post>>,
    replies: RwLock<Vec<Reply>>,
    /// Count of in-flight read operations, not a boolean: `refresh` runs its
    /// two fetches concurrently.
    loading: AtomicUsize,
    error: RwLock<Option<String>>,
    /// Latest dispatched mutation generation per entity. A response is applied
    /// only if no newer generation has been dispatched for that entity since.
    generations: Mutex<HashMap<EntityId, u64>>,
}

impl ForumService {
    pub fn new(
        transport: Arc<dyn Transport>,
        identity: Arc<dyn IdentityProvider>,
        cache: Arc<dyn ListingCache>,
        drafts: Arc<dyn DraftStore>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            transport,
            identity,
            cache,
            drafts,
            debouncer: SearchDebouncer::new(Duration::from_millis(config.search.debounce_ms)),
            posts: RwLock::new(Vec::new()),
            replies: RwLock::new(Vec::new()),
            loading: AtomicUsize::new(0),
            error: RwLock::new(None),
            generations: Mutex::new(HashMap::new()),
        }
    }

    // ---- exposed state ----

    pub async fn posts(&self) -> Vec<Post> {
        self.posts.read().await.clone()
    }

    pub async fn replies(&self) -> Vec<Reply> {
        self.replies.read().await.clone()
    }

    /// True while any read operation is in flight.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst) > 0
    }

    pub async fn error(&self) -> Option<String> {
        self.error.read().await.clone()
    }

    pub async fn current_user(&self) -> Option<CurrentUser> {
        self.identity.current_identity().await
    }

    /// Derived reply count for a post; recomputed, never stored.
    pub async fn reply_count(&self, post: &Post) -> usize {
        let replies = self.replies.read().await;
        reconcile::reply_count_for(post, &replies)
    }

    // ---- read path ----
    //
    // Fetch failures never propagate to the rendering layer: they set the
    // user-facing error string and yield an empty result.

    pub async fn fetch_posts(&self, filters: &PostFilters) -> Vec<Post> {
        self.loading.fetch_add(1, Ordering::SeqCst);
        let result = self.load_posts(filters).await;
        self.loading.fetch_sub(1, Ordering::SeqCst);

        match result {
            Ok(view) => {
                *self.error.write().await = None;
                view
            }
            Err(err) => {
                warn!("post listing fetch failed: {err}");
                *self.error.write().await = Some(err.to_string());
                Vec::new()
            }
        }
    }

    async fn load_posts(&self, filters: &PostFilters) -> Result<Vec<Post>, AppError> {
        if !filters.bypasses_cache() {
            if let Some(cached) = self.cache.get(&CacheKey::posts()).await {
                debug!("serving post listing from cache");
                *self.posts.write().await = cached;
                return Ok(self.view(filters).await);
            }
        }

        let response = self.transport.public(TransportRequest::get("/posts")).await?;
        if !response.ok() {
            return Err(AppError::from_status(response.status, response.error_message()));
        }
        let listing: Vec<PostDto> = response.decode()?;
        let posts: Vec<Post> = listing.into_iter().map(PostDto::into_entity).collect();

        // Only the unfiltered listing is cacheable.
        if !filters.bypasses_cache() {
            self.cache.put(CacheKey::posts(), posts.clone()).await;
        }
        *self.posts.write().await = posts;
        Ok(self.view(filters).await)
    }

    pub async fn fetch_post(&self, id: &EntityId) -> Option<Post> {
        let request = TransportRequest::get(format!("/posts/{}", id.as_str()));
        self.loading.fetch_add(1, Ordering::SeqCst);
        let result: Result<Post, AppError> = async {
            let response = self.transport.public(request).await?;
            if !response.ok() {
                return Err(AppError::from_status(response.status, response.error_message()));
            }
            Ok(response.decode::<PostDto>()?.into_entity())
        }
        .await;
        self.loading.fetch_sub(1, Ordering::SeqCst);

        match result {
            Ok(post) => {
                let mut posts = self.posts.write().await;
                if let Some(slot) = posts.iter_mut().find(|p| p.id == post.id) {
                    *slot = post.clone();
                } else {
                    posts.insert(0, post.clone());
                }
                *self.error.write().await = None;
                Some(post)
            }
            Err(err) => {
                warn!("post fetch failed: {err}");
                *self.error.write().await = Some(err.to_string());
                None
            }
        }
    }

    pub async fn fetch_replies(&self) -> Vec<Reply> {
        self.loading.fetch_add(1, Ordering::SeqCst);
        let result: Result<Vec<Reply>, AppError> = async {
            let response = self
                .transport
                .public(TransportRequest::get("/replies"))
                .await?;
            if !response.ok() {
                return Err(AppError::from_status(response.status, response.error_message()));
            }
            let listing: Vec<ReplyDto> = response.decode()?;
            Ok(listing.into_iter().map(ReplyDto::into_entity).collect())
        }
        .await;
        self.loading.fetch_sub(1, Ordering::SeqCst);

        match result {
            Ok(replies) => {
                *self.replies.write().await = replies.clone();
                *self.error.write().await = None;
                replies
            }
            Err(err) => {
                warn!("reply listing fetch failed: {err}");
                *self.error.write().await = Some(err.to_string());
                Vec::new()
            }
        }
    }

    /// Drop the cached listing and reload both collections.
    pub async fn refresh(&self) -> (Vec<Post>, Vec<Reply>) {
        self.cache.invalidate(&CacheKey::posts()).await;
        futures::future::join(
            self.fetch_posts(&PostFilters::default()),
            self.fetch_replies(),
        )
        .await
    }

    /// Debounced search entry point: waits out the quiet period and performs
    /// the filtered fetch only if no newer keystroke superseded this one.
    pub async fn debounced_search(&self, text: String) -> Option<Vec<Post>> {
        if !self.debouncer.settle().await {
            return None;
        }
        let filters = PostFilters {
            search: Some(text),
            ..Default::default()
        };
        Some(self.fetch_posts(&filters).await)
    }

    // ---- mutation path: posts ----

    pub async fn create_post(&self, payload: CreatePostPayload) -> Result<Post, AppError> {
        payload.validate().map_err(AppError::Validation)?;
        let author = self.author().await;
        let placeholder = Post::new_optimistic(
            payload.title.clone(),
            payload.content.clone(),
            payload.category.clone(),
            payload.tags.clone(),
            &author,
        );
        let local_id = placeholder.id.clone();

        // Most-recent-first convention: optimistic posts go to the front.
        self.posts.write().await.insert(0, placeholder);
        info!(id = %local_id, "dispatching post create");

        let request = TransportRequest::post("/posts", serde_json::to_value(&payload)?);
        let outcome = self.resolve::<PostDto>(request).await;

        match outcome {
            Ok(dto) => {
                let confirmed = dto.into_entity();
                {
                    let mut posts = self.posts.write().await;
                    if let Some(slot) = posts.iter_mut().find(|p| p.id == local_id) {
                        *slot = confirmed.clone();
                    }
                }
                self.cache.invalidate(&CacheKey::posts()).await;
                Ok(confirmed)
            }
            Err(err) => {
                // The placeholder never survives its originating request.
                self.posts.write().await.retain(|p| p.id != local_id);
                if matches!(err, AppError::Serialization(_)) {
                    // The store confirmed the create but the body was
                    // undecodable; the post surfaces on the next refetch.
                    warn!("post create confirmed but response was undecodable");
                    self.cache.invalidate(&CacheKey::posts()).await;
                }
                self.handle_auth_failure(&err).await;
                Err(err)
            }
        }
    }

    pub async fn update_post(
        &self,
        id: &EntityId,
        patch: UpdatePostPayload,
    ) -> Result<Post, AppError> {
        patch.validate().map_err(AppError::Validation)?;
        if id.is_local() {
            return Err(AppError::Validation(format!("post {id} is not yet confirmed")));
        }
        let snapshot = self.posts.read().await.clone();
        if !snapshot.iter().any(|p| p.id == *id) {
            return Err(AppError::Validation(format!("no post with id {id}")));
        }
        // The generation advances only once the mutation actually dispatches;
        // a rejected call must not stale out an in-flight sibling.
        let generation = self.begin_generation(id).await;

        {
            let mut posts = self.posts.write().await;
            if let Some(slot) = posts.iter_mut().find(|p| p.id == *id) {
                patch.apply_to(slot);
                slot.updated_at = Utc::now();
            }
        }
        info!(id = %id, generation, "dispatching post update");

        let request = TransportRequest::put(
            format!("/posts/{}", id.as_str()),
            serde_json::to_value(&patch)?,
        );
        let outcome = self.resolve::<PostDto>(request).await;

        if let Err(err) = &outcome {
            self.handle_auth_failure(err).await;
        }

        if !self.is_current_generation(id, generation).await {
            warn!(id = %id, generation, "discarding stale post update response");
            return outcome.map(PostDto::into_entity);
        }

        match outcome {
            Ok(dto) => {
                let canonical = dto.into_entity();
                {
                    let mut posts = self.posts.write().await;
                    if let Some(slot) = posts.iter_mut().find(|p| p.id == *id) {
                        *slot = canonical.clone();
                    }
                }
                self.cache.invalidate(&CacheKey::posts()).await;
                Ok(canonical)
            }
            Err(err) => {
                // Wholesale restore of the pre-mutation snapshot, not a
                // targeted undo.
                *self.posts.write().await = snapshot;
                if matches!(err, AppError::Serialization(_)) {
                    self.cache.invalidate(&CacheKey::posts()).await;
                }
                Err(err)
            }
        }
    }

    pub async fn delete_post(&self, id: &EntityId) -> Result<(), AppError> {
        if id.is_local() {
            return Err(AppError::Validation(format!("post {id} is not yet confirmed")));
        }
        let generation = self.begin_generation(id).await;
        let snapshot = self.posts.read().await.clone();

        self.posts.write().await.retain(|p| p.id != *id);
        info!(id = %id, generation, "dispatching post delete");

        let request = TransportRequest::delete(format!("/posts/{}", id.as_str()));
        let outcome = self.resolve_empty(request).await;

        if let Err(err) = &outcome {
            self.handle_auth_failure(err).await;
        }

        if !self.is_current_generation(id, generation).await {
            warn!(id = %id, generation, "discarding stale post delete response");
            return outcome;
        }

        match outcome {
            Ok(()) => {
                self.cache.invalidate(&CacheKey::posts()).await;
                Ok(())
            }
            Err(err) => {
                *self.posts.write().await = snapshot;
                Err(err)
            }
        }
    }

    // ---- mutation path: replies ----

    pub async fn create_reply(&self, payload: CreateReplyPayload) -> Result<Reply, AppError> {
        payload.validate().map_err(AppError::Validation)?;
        let author = self.author().await;
        let placeholder =
            Reply::new_optimistic(payload.post_id.clone(), payload.content.clone(), &author);
        let local_id = placeholder.id.clone();

        // Replies append in conversation order.
        self.replies.write().await.push(placeholder);
        info!(id = %local_id, post = %payload.post_id, "dispatching reply create");

        let body = json!({
            "post_id": payload.post_id.as_str(),
            "content": payload.content,
        });
        let outcome = self
            .resolve::<ReplyDto>(TransportRequest::post("/replies", body))
            .await;

        match outcome {
            Ok(dto) => {
                let confirmed = dto.into_entity();
                {
                    let mut replies = self.replies.write().await;
                    if let Some(slot) = replies.iter_mut().find(|r| r.id == local_id) {
                        *slot = confirmed.clone();
                    }
                }
                self.cache.invalidate(&CacheKey::posts()).await;
                Ok(confirmed)
            }
            Err(err) => {
                self.replies.write().await.retain(|r| r.id != local_id);
                if matches!(err, AppError::Serialization(_)) {
                    warn!("reply create confirmed but response was undecodable");
                    self.cache.invalidate(&CacheKey::posts()).await;
                }
                self.handle_auth_failure(&err).await;
                Err(err)
            }
        }
    }

    pub async fn update_reply(
        &self,
        id: &EntityId,
        patch: UpdateReplyPayload,
    ) -> Result<Reply, AppError> {
        patch.validate().map_err(AppError::Validation)?;
        if id.is_local() {
            return Err(AppError::Validation(format!("reply {id} is not yet confirmed")));
        }
        let snapshot = self.replies.read().await.clone();
        if !snapshot.iter().any(|r| r.id == *id) {
            return Err(AppError::Validation(format!("no reply with id {id}")));
        }
        let generation = self.begin_generation(id).await;

        {
            let mut replies = self.replies.write().await;
            if let Some(slot) = replies.iter_mut().find(|r| r.id == *id) {
                patch.apply_to(slot);
            }
        }
        info!(id = %id, generation, "dispatching reply update");

        let request = TransportRequest::put(
            format!("/replies/{}", id.as_str()),
            serde_json::to_value(&patch)?,
        );
        let outcome = self.resolve::<ReplyDto>(request).await;

        if let Err(err) = &outcome {
            self.handle_auth_failure(err).await;
        }

        if !self.is_current_generation(id, generation).await {
            warn!(id = %id, generation, "discarding stale reply update response");
            return outcome.map(ReplyDto::into_entity);
        }

        match outcome {
            Ok(dto) => {
                let canonical = dto.into_entity();
                {
                    let mut replies = self.replies.write().await;
                    if let Some(slot) = replies.iter_mut().find(|r| r.id == *id) {
                        *slot = canonical.clone();
                    }
                }
                self.cache.invalidate(&CacheKey::posts()).await;
                Ok(canonical)
            }
            Err(err) => {
                *self.replies.write().await = snapshot;
                if matches!(err, AppError::Serialization(_)) {
                    self.cache.invalidate(&CacheKey::posts()).await;
                }
                Err(err)
            }
        }
    }

    pub async fn delete_reply(&self, id: &EntityId) -> Result<(), AppError> {
        if id.is_local() {
            return Err(AppError::Validation(format!("reply {id} is not yet confirmed")));
        }
        let generation = self.begin_generation(id).await;
        let snapshot = self.replies.read().await.clone();

        self.replies.write().await.retain(|r| r.id != *id);
        info!(id = %id, generation, "dispatching reply delete");

        let request = TransportRequest::delete(format!("/replies/{}", id.as_str()));
        let outcome = self.resolve_empty(request).await;

        if let Err(err) = &outcome {
            self.handle_auth_failure(err).await;
        }

        if !self.is_current_generation(id, generation).await {
            warn!(id = %id, generation, "discarding stale reply delete response");
            return outcome;
        }

        match outcome {
            Ok(()) => {
                self.cache.invalidate(&CacheKey::posts()).await;
                Ok(())
            }
            Err(err) => {
                *self.replies.write().await = snapshot;
                Err(err)
            }
        }
    }

    // ---- drafts ----

    pub async fn save_draft(&self, key: &str, text: String) -> Result<(), AppError> {
        self.drafts.save(Draft::new(key, text)).await
    }

    pub async fn load_draft(&self, key: &str) -> Result<Option<Draft>, AppError> {
        self.drafts.load(key).await
    }

    pub async fn clear_draft(&self, key: &str) -> Result<(), AppError> {
        self.drafts.clear(key).await
    }

    // ---- internals ----

    async fn author(&self) -> CurrentUser {
        self.identity
            .current_identity()
            .await
            .unwrap_or_else(CurrentUser::placeholder)
    }

    async fn view(&self, filters: &PostFilters) -> Vec<Post> {
        let posts = self.posts.read().await.clone();
        let replies = self.replies.read().await.clone();
        let mut view = query::filter_posts(&posts, filters);
        query::sort_posts(&mut view, filters.sort, &replies);
        view
    }

    /// Issue an authenticated mutation and normalize its resolution: transport
    /// rejection → `Network`, non-success status → classified by status,
    /// success with undecodable body → `Serialization`.
    async fn resolve<T: serde::de::DeserializeOwned>(
        &self,
        request: TransportRequest,
    ) -> Result<T, AppError> {
        let response = self.transport.authenticated(request).await?;
        if !response.ok() {
            return Err(AppError::from_status(response.status, response.error_message()));
        }
        response.decode()
    }

    async fn resolve_empty(&self, request: TransportRequest) -> Result<(), AppError> {
        let response: TransportResponse = self.transport.authenticated(request).await?;
        if !response.ok() {
            return Err(AppError::from_status(response.status, response.error_message()));
        }
        Ok(())
    }

    /// Credentials rejected or forbidden: clear session artifacts and signal
    /// the host to redirect to the authentication entry point, on top of the
    /// rollback the failing mutation already performs.
    async fn handle_auth_failure(&self, err: &AppError) {
        if err.is_auth() {
            warn!("authorization failure: clearing session and requesting login");
            self.identity.clear_session().await;
            self.identity.request_login().await;
        }
    }

    async fn begin_generation(&self, id: &EntityId) -> u64 {
        let mut generations = self.generations.lock().await;
        let entry = generations.entry(id.clone()).or_insert(0);
        *entry += 1;
        *entry
    }

    async fn is_current_generation(&self, id: &EntityId, generation: u64) -> bool {
        let generations = self.generations.lock().await;
        generations.get(id).copied().unwrap_or(0) == generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::clock::ManualClock;
    use crate::infrastructure::cache::PostListingCache;
    use crate::infrastructure::storage::MemoryDraftStore;
    use serde_json::Value;
    use std::collections::VecDeque;
    use tokio::sync::Notify;

    const TS: &str = "2024-01-01T00:00:00Z";

    struct ScriptedResponse {
        result: Result<TransportResponse, AppError>,
        gate: Option<Arc<Notify>>,
    }

    #[derive(Default)]
    struct MockTransport {
        script: Mutex<VecDeque<ScriptedResponse>>,
        calls: Mutex<Vec<String>>,
    }

    impl MockTransport {
        async fn push(&self, result: Result<TransportResponse, AppError>, gate: Option<Arc<Notify>>) {
            self.script
                .lock()
                .await
                .push_back(ScriptedResponse { result, gate });
        }

        async fn push_ok(&self, body: Value) {
            self.push(Ok(TransportResponse::new(200, body)), None).await;
        }

        async fn push_status(&self, status: u16, body: Value) {
            self.push(Ok(TransportResponse::new(status, body)), None).await;
        }

        async fn push_err(&self, err: AppError) {
            self.push(Err(err), None).await;
        }

        async fn push_gated(
            &self,
            result: Result<TransportResponse, AppError>,
            gate: Arc<Notify>,
        ) {
            self.push(result, Some(gate)).await;
        }

        async fn calls(&self) -> Vec<String> {
            self.calls.lock().await.clone()
        }

        async fn respond(&self, label: String) -> Result<TransportResponse, AppError> {
            self.calls.lock().await.push(label);
            let scripted = self
                .script
                .lock()
                .await
                .pop_front()
                .expect("unscripted transport call");
            if let Some(gate) = scripted.gate {
                gate.notified().await;
            }
            scripted.result
        }
    }

    #[async_trait::async_trait]
    impl Transport for MockTransport {
        async fn authenticated(
            &self,
            request: TransportRequest,
        ) -> Result<TransportResponse, AppError> {
            self.respond(format!("auth {} {}", request.method, request.path))
                .await
        }

        async fn public(&self, request: TransportRequest) -> Result<TransportResponse, AppError> {
            self.respond(format!("public {} {}", request.method, request.path))
                .await
        }
    }

    struct MockIdentity {
        user: Option<CurrentUser>,
        sessions_cleared: AtomicUsize,
        login_requests: AtomicUsize,
    }

    impl MockIdentity {
        fn logged_in() -> Self {
            Self {
                user: Some(CurrentUser::new("u1", "Alice")),
                sessions_cleared: AtomicUsize::new(0),
                login_requests: AtomicUsize::new(0),
            }
        }

        fn anonymous() -> Self {
            Self {
                user: None,
                sessions_cleared: AtomicUsize::new(0),
                login_requests: AtomicUsize::new(0),
            }
        }

        fn sessions_cleared(&self) -> usize {
            self.sessions_cleared.load(Ordering::SeqCst)
        }

        fn login_requests(&self) -> usize {
            self.login_requests.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl IdentityProvider for MockIdentity {
        async fn current_identity(&self) -> Option<CurrentUser> {
            self.user.clone()
        }

        async fn clear_session(&self) {
            self.sessions_cleared.fetch_add(1, Ordering::SeqCst);
        }

        async fn request_login(&self) {
            self.login_requests.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Harness {
        service: Arc<ForumService>,
        transport: Arc<MockTransport>,
        identity: Arc<MockIdentity>,
        clock: Arc<ManualClock>,
    }

    fn harness_with_identity(identity: MockIdentity) -> Harness {
        let transport = Arc::new(MockTransport::default());
        let identity = Arc::new(identity);
        let clock = Arc::new(ManualClock::new());
        let config = EngineConfig::default();
        let cache = Arc::new(PostListingCache::new(
            Duration::from_secs(config.cache.posts_ttl_secs),
            clock.clone(),
        ));
        let service = Arc::new(ForumService::new(
            transport.clone(),
            identity.clone(),
            cache,
            Arc::new(MemoryDraftStore::new()),
            &config,
        ));
        Harness {
            service,
            transport,
            identity,
            clock,
        }
    }

    fn harness() -> Harness {
        harness_with_identity(MockIdentity::logged_in())
    }

    fn post_json(id: &str, title: &str, category: &str) -> Value {
        json!({
            "id": id,
            "author_id": "u1",
            "author_name": "Alice",
            "title": title,
            "content": format!("{title} content"),
            "category": category,
            "tags": ["finance"],
            "created_at": TS,
            "updated_at": TS,
        })
    }

    fn reply_json(id: &str, post_id: &str) -> Value {
        json!({
            "id": id,
            "post_id": post_id,
            "author_id": "u2",
            "author_name": "Bob",
            "content": "a reply",
            "created_at": TS,
        })
    }

    fn create_payload(title: &str) -> CreatePostPayload {
        CreatePostPayload {
            title: title.into(),
            content: format!("{title} body"),
            category: "General".into(),
            tags: vec![],
        }
    }

    fn title_patch(title: &str) -> UpdatePostPayload {
        UpdatePostPayload {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    async fn seed_posts(h: &Harness, listing: Value) {
        h.transport.push_ok(listing).await;
        h.service.fetch_posts(&PostFilters::default()).await;
    }

    #[tokio::test]
    async fn exactly_one_placeholder_between_dispatch_and_resolution() {
        let h = harness();
        let gate = Arc::new(Notify::new());
        h.transport
            .push_gated(
                Ok(TransportResponse::new(201, post_json("p-1", "A", "General"))),
                gate.clone(),
            )
            .await;

        let service = h.service.clone();
        let task =
            tokio::spawn(async move { service.create_post(create_payload("A")).await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let mid_flight = h.service.posts().await;
        assert_eq!(mid_flight.iter().filter(|p| p.is_optimistic).count(), 1);
        assert!(mid_flight[0].id.is_local());

        gate.notify_one();
        let created = task.await.expect("task joins").expect("create succeeds");
        assert_eq!(created.id, EntityId::durable("p-1"));
        assert!(!created.is_optimistic);

        let resolved = h.service.posts().await;
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved.iter().filter(|p| p.is_optimistic).count(), 0);
    }

    #[tokio::test]
    async fn failed_create_restores_exact_prior_state() {
        let h = harness();
        seed_posts(&h, json!([post_json("p-1", "Existing", "General")])).await;
        let before = h.service.posts().await;

        let gate = Arc::new(Notify::new());
        h.transport
            .push_gated(Err(AppError::Network("connection reset".into())), gate.clone())
            .await;

        let service = h.service.clone();
        let task =
            tokio::spawn(async move { service.create_post(create_payload("A")).await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let mid_flight = h.service.posts().await;
        assert_eq!(mid_flight.len(), 2);
        assert!(mid_flight[0].is_optimistic, "placeholder inserts at front");
        assert_eq!(mid_flight[0].title, "A");

        gate.notify_one();
        let err = task
            .await
            .expect("task joins")
            .expect_err("create rejects against the failing transport");
        assert!(matches!(err, AppError::Network(_)));
        assert_eq!(h.service.posts().await, before);
    }

    #[tokio::test]
    async fn failed_update_rolls_back_to_content_identical_snapshot() {
        let h = harness();
        seed_posts(
            &h,
            json!([post_json("p-1", "One", "General"), post_json("p-2", "Two", "General")]),
        )
        .await;
        let before = h.service.posts().await;

        h.transport
            .push_status(500, json!({"message": "boom"}))
            .await;
        let err = h
            .service
            .update_post(&EntityId::durable("p-1"), title_patch("X"))
            .await
            .expect_err("server failure propagates");
        assert!(matches!(err, AppError::Server { status: 500, .. }));
        assert_eq!(h.service.posts().await, before);
    }

    #[tokio::test]
    async fn stale_update_response_is_discarded_with_conflict() {
        let h = harness();
        seed_posts(&h, json!([post_json("p-1", "orig", "General")])).await;
        let id = EntityId::durable("p-1");

        // X dispatched first but resolves last.
        let gate = Arc::new(Notify::new());
        h.transport
            .push_gated(
                Ok(TransportResponse::new(200, post_json("p-1", "X", "General"))),
                gate.clone(),
            )
            .await;
        h.transport.push_ok(post_json("p-1", "Y", "General")).await;

        let service = h.service.clone();
        let id_x = id.clone();
        let x_task =
            tokio::spawn(async move { service.update_post(&id_x, title_patch("X")).await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let y = h
            .service
            .update_post(&id, title_patch("Y"))
            .await
            .expect("later-dispatched update applies");
        assert_eq!(y.title, "Y");

        gate.notify_one();
        let x = x_task
            .await
            .expect("task joins")
            .expect("X still observes its own outcome");
        assert_eq!(x.title, "X");

        // Local state keeps the newest-dispatched mutation; the stale
        // response was discarded.
        let posts = h.service.posts().await;
        assert_eq!(posts[0].title, "Y");
    }

    #[tokio::test]
    async fn category_filter_bypasses_a_warm_cache() {
        let h = harness();
        seed_posts(
            &h,
            json!([post_json("p-1", "One", "Beginner"), post_json("p-2", "Two", "Advanced")]),
        )
        .await;
        assert_eq!(h.transport.calls().await.len(), 1);

        h.transport
            .push_ok(json!([
                post_json("p-1", "One", "Beginner"),
                post_json("p-2", "Two", "Advanced")
            ]))
            .await;
        let filtered = h
            .service
            .fetch_posts(&PostFilters {
                category: Some("Beginner".into()),
                ..Default::default()
            })
            .await;

        assert_eq!(
            h.transport.calls().await.len(),
            2,
            "warm cache must not serve a filtered query"
        );
        assert!(!filtered.is_empty());
        assert!(filtered.iter().all(|p| p.category == "Beginner"));
    }

    #[tokio::test]
    async fn warm_cache_serves_unfiltered_reads_until_expiry() {
        let h = harness();
        seed_posts(&h, json!([post_json("p-1", "One", "General")])).await;

        // Inside the TTL window: no network call.
        let cached = h.service.fetch_posts(&PostFilters::default()).await;
        assert_eq!(cached.len(), 1);
        assert_eq!(h.transport.calls().await.len(), 1);

        // Past the TTL: the next read fetches again.
        h.clock.advance(Duration::from_secs(301));
        h.transport
            .push_ok(json!([post_json("p-1", "One", "General")]))
            .await;
        h.service.fetch_posts(&PostFilters::default()).await;
        assert_eq!(h.transport.calls().await.len(), 2);
    }

    #[tokio::test]
    async fn unauthorized_delete_reply_restores_position_and_clears_session() {
        let h = harness();
        h.transport
            .push_ok(json!([
                reply_json("r-1", "p-1"),
                reply_json("r-2", "p-1"),
                reply_json("r-3", "p-1")
            ]))
            .await;
        h.service.fetch_replies().await;

        h.transport
            .push_status(403, json!({"message": "not the author"}))
            .await;
        let err = h
            .service
            .delete_reply(&EntityId::durable("r-2"))
            .await
            .expect_err("authorization failure propagates");
        assert!(err.is_auth());

        let replies = h.service.replies().await;
        let ids: Vec<&str> = replies.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r-1", "r-2", "r-3"], "exact original position");
        assert_eq!(h.identity.sessions_cleared(), 1);
        assert_eq!(h.identity.login_requests(), 1);
    }

    #[tokio::test]
    async fn create_reply_appends_and_promotes() {
        let h = harness();
        h.transport.push_ok(json!([reply_json("r-1", "p-1")])).await;
        h.service.fetch_replies().await;

        h.transport.push_ok(reply_json("r-9", "p-1")).await;
        let created = h
            .service
            .create_reply(CreateReplyPayload {
                post_id: EntityId::durable("p-1"),
                content: "adding on".into(),
            })
            .await
            .expect("reply create succeeds");

        assert_eq!(created.id, EntityId::durable("r-9"));
        let replies = h.service.replies().await;
        assert_eq!(replies.len(), 2);
        assert_eq!(replies.last().map(|r| r.id.as_str()), Some("r-9"));
        assert!(replies.iter().all(|r| !r.is_optimistic));
    }

    #[tokio::test]
    async fn unresolved_identity_falls_back_to_placeholder_author() {
        let h = harness_with_identity(MockIdentity::anonymous());
        let gate = Arc::new(Notify::new());
        h.transport
            .push_gated(
                Ok(TransportResponse::new(201, post_json("p-1", "A", "General"))),
                gate.clone(),
            )
            .await;

        let service = h.service.clone();
        let task =
            tokio::spawn(async move { service.create_post(create_payload("A")).await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let mid_flight = h.service.posts().await;
        assert_eq!(mid_flight[0].author_name, "Guest");
        assert_eq!(mid_flight[0].author_id, "unknown");

        gate.notify_one();
        task.await.expect("task joins").expect("create succeeds");
    }

    #[tokio::test]
    async fn fetch_failure_sets_error_and_yields_empty_view() {
        let h = harness();
        h.transport.push_err(AppError::Network("offline".into())).await;

        let view = h.service.fetch_posts(&PostFilters::default()).await;
        assert!(view.is_empty());
        let error = h.service.error().await.expect("error string set");
        assert!(error.contains("Network"));

        // A later successful fetch clears the error.
        h.transport
            .push_ok(json!([post_json("p-1", "One", "General")]))
            .await;
        let view = h.service.fetch_posts(&PostFilters::default()).await;
        assert_eq!(view.len(), 1);
        assert!(h.service.error().await.is_none());
    }

    #[tokio::test]
    async fn successful_mutation_invalidates_the_listing_cache() {
        let h = harness();
        seed_posts(&h, json!([post_json("p-1", "One", "General")])).await;

        h.transport.push_ok(post_json("p-2", "Two", "General")).await;
        h.service
            .create_post(create_payload("Two"))
            .await
            .expect("create succeeds");

        // The next unfiltered read must refetch.
        h.transport
            .push_ok(json!([
                post_json("p-2", "Two", "General"),
                post_json("p-1", "One", "General")
            ]))
            .await;
        h.service.fetch_posts(&PostFilters::default()).await;
        assert_eq!(h.transport.calls().await.len(), 3);
    }

    #[tokio::test]
    async fn invalid_payload_never_reaches_the_network() {
        let h = harness();
        let err = h
            .service
            .create_post(CreatePostPayload {
                title: "  ".into(),
                content: "body".into(),
                category: "General".into(),
                tags: vec![],
            })
            .await
            .expect_err("validation rejects");
        assert!(matches!(err, AppError::Validation(_)));
        assert!(h.transport.calls().await.is_empty());
    }

    #[tokio::test]
    async fn update_of_unknown_entity_is_a_validation_error() {
        let h = harness();
        let err = h
            .service
            .update_post(&EntityId::durable("ghost"), title_patch("X"))
            .await
            .expect_err("unknown id rejects");
        assert!(matches!(err, AppError::Validation(_)));
        assert!(h.transport.calls().await.is_empty());
    }

    #[tokio::test]
    async fn undecodable_success_body_removes_placeholder() {
        let h = harness();
        h.transport
            .push_status(201, json!({"unexpected": "shape"}))
            .await;

        let err = h
            .service
            .create_post(create_payload("A"))
            .await
            .expect_err("undecodable confirmation surfaces");
        assert!(matches!(err, AppError::Serialization(_)));
        assert!(
            h.service.posts().await.is_empty(),
            "no placeholder survives its originating request"
        );
    }

    #[tokio::test]
    async fn reply_counts_follow_the_optimistic_parent_until_confirmed() {
        let h = harness();
        let gate = Arc::new(Notify::new());
        h.transport
            .push_gated(
                Ok(TransportResponse::new(201, post_json("p-1", "Fresh", "General"))),
                gate.clone(),
            )
            .await;

        let service = h.service.clone();
        let task =
            tokio::spawn(async move { service.create_post(create_payload("Fresh")).await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let placeholder = h.service.posts().await[0].clone();
        assert_eq!(h.service.reply_count(&placeholder).await, 0);

        gate.notify_one();
        let confirmed = task.await.expect("task joins").expect("create succeeds");

        // Replies refetched against the durable id now resolve.
        h.transport.push_ok(json!([reply_json("r-1", "p-1")])).await;
        h.service.fetch_replies().await;
        assert_eq!(h.service.reply_count(&confirmed).await, 1);
    }

    #[tokio::test]
    async fn draft_survives_until_cleared() {
        let h = harness();
        h.service
            .save_draft("post:new", "unfinished idea".into())
            .await
            .expect("save draft");
        let loaded = h.service.load_draft("post:new").await.expect("load draft");
        assert_eq!(loaded.map(|d| d.text), Some("unfinished idea".into()));

        h.service.clear_draft("post:new").await.expect("clear draft");
        assert!(h
            .service
            .load_draft("post:new")
            .await
            .expect("reload")
            .is_none());
    }

    #[tokio::test]
    async fn rejected_update_leaves_an_inflight_delete_rollback_intact() {
        let h = harness();
        seed_posts(&h, json!([post_json("p-1", "One", "General")])).await;
        let before = h.service.posts().await;
        let id = EntityId::durable("p-1");

        // Hold a failing delete in flight; the post is already removed
        // locally while it waits.
        let gate = Arc::new(Notify::new());
        h.transport
            .push_gated(
                Ok(TransportResponse::new(500, json!({"message": "boom"}))),
                gate.clone(),
            )
            .await;
        let service = h.service.clone();
        let delete_id = id.clone();
        let delete_task =
            tokio::spawn(async move { service.delete_post(&delete_id).await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Rejected before dispatch: must not advance the entity's generation
        // and stale out the delete's rollback.
        let err = h
            .service
            .update_post(&id, title_patch("X"))
            .await
            .expect_err("update of a locally removed post rejects");
        assert!(matches!(err, AppError::Validation(_)));

        gate.notify_one();
        let delete_err = delete_task
            .await
            .expect("task joins")
            .expect_err("delete fails");
        assert!(matches!(delete_err, AppError::Server { status: 500, .. }));
        assert_eq!(
            h.service.posts().await,
            before,
            "failed delete must roll back"
        );
    }

    #[tokio::test]
    async fn unconfirmed_local_ids_never_reach_the_wire() {
        let h = harness();
        let local = EntityId::local();

        let err = h
            .service
            .update_post(&local, title_patch("X"))
            .await
            .expect_err("local post id rejects");
        assert!(matches!(err, AppError::Validation(_)));
        let err = h
            .service
            .delete_post(&local)
            .await
            .expect_err("local post id rejects");
        assert!(matches!(err, AppError::Validation(_)));
        let err = h
            .service
            .update_reply(
                &local,
                UpdateReplyPayload {
                    content: Some("edited".into()),
                },
            )
            .await
            .expect_err("local reply id rejects");
        assert!(matches!(err, AppError::Validation(_)));
        let err = h
            .service
            .delete_reply(&local)
            .await
            .expect_err("local reply id rejects");
        assert!(matches!(err, AppError::Validation(_)));

        assert!(h.transport.calls().await.is_empty());
    }

    #[tokio::test]
    async fn loading_flag_covers_reply_fetches() {
        let h = harness();
        let gate = Arc::new(Notify::new());
        h.transport
            .push_gated(Ok(TransportResponse::new(200, json!([]))), gate.clone())
            .await;

        let service = h.service.clone();
        let task = tokio::spawn(async move { service.fetch_replies().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(h.service.is_loading());

        gate.notify_one();
        task.await.expect("task joins");
        assert!(!h.service.is_loading());
    }
}
