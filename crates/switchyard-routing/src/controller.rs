//! Persisted routes and hop styles.
//!
//! [`RouteController`] keeps the database and the in-memory hub in step:
//! every route is written inside one transaction before it goes live, and
//! style edits reload the hub's sorted copies.

use std::sync::Arc;

use tracing::{debug, info, warn};

use switchyard_core::{HopColor, HopFormat, RouteModifierRecord, RouteRecord, expression};
use switchyard_storage::{Storage, StorageTransaction, commit, rollback, route as route_store};

use crate::error::{RouteError, RouteResult};
use crate::hub::MessageHub;
use crate::route::MessageRoute;

/// Loads, adds and deletes persisted routes.
#[derive(Debug, Clone)]
pub struct RouteController {
    hub: Arc<MessageHub>,
    storage: Storage,
}

impl RouteController {
    pub fn new(hub: Arc<MessageHub>, storage: Storage) -> Self {
        Self { hub, storage }
    }

    pub fn hub(&self) -> &Arc<MessageHub> {
        &self.hub
    }

    /// Adds every stored route to the hub and loads the hop styles.
    ///
    /// Routes whose modifiers can no longer be built are skipped with a
    /// warning. Returns the number of routes loaded.
    pub async fn load_routes(&self) -> RouteResult<usize> {
        self.hub.reload_styles(self.storage.styles()).await?;

        let mut loaded = 0;
        for record in self.storage.routes().list().await? {
            let id = record.id;
            match self.hub.create_message_route(record) {
                Ok(route) => {
                    self.hub.add_route(route);
                    loaded += 1;
                }
                Err(e) => warn!(id, error = %e, "Unable to load route"),
            }
        }
        info!(count = loaded, "Loaded routes");
        Ok(loaded)
    }

    /// Persists `record` and activates it.
    ///
    /// Modifiers are built first, so a route that could never run is not
    /// stored.
    pub async fn add_route(&self, record: RouteRecord) -> RouteResult<Arc<MessageRoute>> {
        let live = self.hub.create_message_route(record)?;

        let mut tx = self.storage.begin().await?;
        let stored = match route_store::insert(&mut tx, live.record()).await {
            Ok(stored) => stored,
            Err(e) => {
                discard(tx).await;
                return Err(e.into());
            }
        };
        commit(tx).await?;

        let route = MessageRoute::new(stored, live.modifiers().to_vec());
        Ok(self.hub.add_route(route))
    }

    /// Adds a route whose modifiers are written as an expression such as
    /// `if-has-prefix(prefix="-") if-not-by(sender=Nady)`.
    pub async fn add_route_expression(
        &self,
        source: &str,
        destination: &str,
        two_way: bool,
        modifiers: &str,
    ) -> RouteResult<Arc<MessageRoute>> {
        let mut record = RouteRecord::new(source, destination).two_way(two_way);
        record.modifiers = expression::parse(modifiers)?
            .into_iter()
            .map(RouteModifierRecord::from)
            .collect();
        self.add_route(record).await
    }

    /// Deletes route `id` from the database and the hub.
    pub async fn delete_route(&self, id: i64) -> RouteResult<()> {
        let mut tx = self.storage.begin().await?;
        match route_store::delete(&mut tx, id).await {
            Ok(true) => {}
            Ok(false) => {
                discard(tx).await;
                return Err(RouteError::NotFound(id));
            }
            Err(e) => {
                discard(tx).await;
                return Err(e.into());
            }
        }
        commit(tx).await?;

        if self.hub.delete_route_id(id).is_none() {
            debug!(id, "Deleted route was not active");
        }
        Ok(())
    }

    /// All active routes.
    pub fn list_routes(&self) -> Vec<Arc<MessageRoute>> {
        self.hub.routes()
    }

    pub async fn add_hop_color(&self, color: HopColor) -> RouteResult<HopColor> {
        let stored = self.storage.styles().add_color(&color).await?;
        self.hub.reload_styles(self.storage.styles()).await?;
        Ok(stored)
    }

    pub async fn delete_hop_color(&self, id: i64) -> RouteResult<()> {
        self.storage.styles().delete_color(id).await?;
        self.hub.reload_styles(self.storage.styles()).await?;
        Ok(())
    }

    pub async fn add_hop_format(&self, format: HopFormat) -> RouteResult<HopFormat> {
        let stored = self.storage.styles().add_format(&format).await?;
        self.hub.reload_styles(self.storage.styles()).await?;
        Ok(stored)
    }

    pub async fn delete_hop_format(&self, id: i64) -> RouteResult<()> {
        self.storage.styles().delete_format(id).await?;
        self.hub.reload_styles(self.storage.styles()).await?;
        Ok(())
    }
}

async fn discard(tx: StorageTransaction) {
    if let Err(e) = rollback(tx).await {
        warn!(error = %e, "Rollback failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchyard_core::{RoutableEvent, Source, hop};

    async fn controller() -> RouteController {
        let storage = Storage::memory().await.unwrap();
        RouteController::new(Arc::new(MessageHub::new()), storage)
    }

    #[tokio::test]
    async fn added_routes_survive_a_reload() {
        let controller = controller().await;
        let route = controller
            .add_route_expression("aoorg", "relay(nady)", true, r#"if-has-prefix(prefix="-")"#)
            .await
            .unwrap();
        assert!(route.id() > 0);
        assert_eq!(route.modifiers().len(), 1);
        assert!(controller.hub().has_route_for("relay(nady)"));

        let fresh = RouteController::new(Arc::new(MessageHub::new()), controller.storage.clone());
        assert_eq!(fresh.load_routes().await.unwrap(), 1);
        let routes = fresh.list_routes();
        assert_eq!(routes[0].to_string(), r#"aoorg <-> relay(nady) if-has-prefix(prefix="-")"#);
    }

    #[tokio::test]
    async fn invalid_modifiers_are_not_stored() {
        let controller = controller().await;
        let err = controller
            .add_route_expression("aoorg", "web", false, "if-has-prefix()")
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required argument 'prefix' to 'if-has-prefix'."
        );

        let err = controller
            .add_route_expression("aoorg", "web", false, "shout-loudly()")
            .await
            .unwrap_err();
        assert!(matches!(err, RouteError::UnknownModifier(name) if name == "shout-loudly"));

        assert!(matches!(
            controller
                .add_route_expression("aoorg", "web", false, "if-has-prefix(prefix=")
                .await,
            Err(RouteError::Parse(_))
        ));
        assert_eq!(controller.storage.routes().count().await.unwrap(), 0);
        assert!(controller.list_routes().is_empty());
    }

    #[tokio::test]
    async fn delete_removes_from_store_and_hub() {
        let controller = controller().await;
        let kept = controller
            .add_route(RouteRecord::new("aopriv", "web"))
            .await
            .unwrap();
        let gone = controller
            .add_route(RouteRecord::new("aoorg", "web").two_way(true))
            .await
            .unwrap();

        controller.delete_route(gone.id()).await.unwrap();
        assert!(matches!(
            controller.delete_route(gone.id()).await,
            Err(RouteError::NotFound(id)) if id == gone.id()
        ));

        let ids: Vec<_> = controller.list_routes().iter().map(|r| r.id()).collect();
        assert_eq!(ids, [kept.id()]);
        assert_eq!(controller.storage.routes().count().await.unwrap(), 1);
        assert!(!controller.hub().has_route_for("web"));
    }

    #[tokio::test]
    async fn style_edits_reload_the_hub() {
        let controller = controller().await;
        let color = controller
            .add_hop_color(HopColor::tag("aoorg", "FF0000"))
            .await
            .unwrap();
        controller.add_hop_format(HopFormat::hidden("aopriv")).await.unwrap();

        let event = RoutableEvent::message(
            vec![Source::new(hop::ORG, "Troet"), Source::new(hop::PRIV, "Nadybot")],
            "hi",
        );
        assert_eq!(
            controller.hub().render_path(&event, "web", true, false),
            "<font color=#FF0000>[Troet]<end> "
        );

        controller.delete_hop_color(color.id).await.unwrap();
        assert_eq!(controller.hub().render_path(&event, "web", true, false), "[Troet] ");
        assert!(controller.delete_hop_color(color.id).await.is_err());
    }
}
