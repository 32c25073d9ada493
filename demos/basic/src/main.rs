use std::collections::HashMap;

use log::{info, warn};
use serde_json::{json, Value};

use relgraph::{
    AutoFetch, Attrs, Event, EventKind, Graph, LoopbackTransport, Method, ModelType, NodeKey, Schema,
    SyncFailure,
};

fn schema() -> Schema {
    Schema::builder()
        .model(ModelType::new("User").url_root("/users"))
        .model(
            ModelType::new("Post")
                .url_root("/posts")
                .reference("author", "User")
                .embedding("body", "Body")
                .auto_fetch(AutoFetch::keys(["author"]))
                .inline_json(["body"]),
        )
        .model(ModelType::new("Body"))
        .build()
        .unwrap_or_else(|error| panic!("demo schema is invalid: {}", error))
}

/// Answers requests from a fixed set of documents.
struct Server {
    documents: HashMap<String, Value>,
}

impl Server {
    fn new() -> Self {
        let mut documents = HashMap::new();
        documents.insert("/users/7".to_string(), json!({ "id": 7, "name": "ann" }));
        documents.insert(
            "/posts/1".to_string(),
            json!({ "id": 1, "title": "hello", "authorId": 7, "body": { "text": "first post" } }),
        );
        Self { documents }
    }

    fn answer(&mut self, method: Method, url: &str, body: Option<Value>) -> Result<Value, SyncFailure> {
        match method {
            Method::Read => self
                .documents
                .get(url)
                .cloned()
                .ok_or_else(|| SyncFailure::new(404)),
            Method::Create | Method::Update | Method::Patch => {
                let body = body.unwrap_or(Value::Null);
                self.documents.insert(url.to_string(), body.clone());
                Ok(body)
            }
            Method::Delete => {
                self.documents.remove(url);
                Ok(Value::Null)
            }
        }
    }
}

pub struct App {
    graph: Graph,
    transport: LoopbackTransport,
    server: Server,
    request_count: u32,
}

impl App {
    pub fn default() -> Self {
        info!("Relgraph Basic Demo started");

        let transport = LoopbackTransport::new();
        let graph = Graph::new(schema(), transport.clone());

        App {
            graph,
            transport,
            server: Server::new(),
            request_count: 0,
        }
    }

    /// Hands every outstanding request to the server and its answer back to
    /// the graph. Returns false once nothing was pending.
    pub fn update(&mut self) -> bool {
        let Some(request) = self.transport.take() else {
            return false;
        };
        self.request_count += 1;
        info!("Client send -> {} {}", request.method, request.url);

        let outcome = self.server.answer(request.method, &request.url, request.body);
        if let Err(failure) = &outcome {
            warn!("Server failed {}: {}", request.url, failure);
        }
        if let Err(error) = self.graph.complete_sync(request.id, outcome) {
            warn!("Client could not apply {}: {}", request.url, error);
        }
        true
    }

    fn watch(&mut self, node: NodeKey) {
        for kind in [EventKind::Sync, EventKind::DeepSync, EventKind::DeepChange, EventKind::Error] {
            self.graph.on(node, kind, |graph, event| {
                let name = graph.type_name(event.node()).unwrap_or("?").to_string();
                match event {
                    Event::DeepChange { changed, .. } => {
                        info!("{} {:?}: {} (from {:?})", name, event.node(), event.name(), changed)
                    }
                    Event::Error { failed, failure, .. } => {
                        warn!("{} {:?}: {:?} {}", name, event.node(), failed, failure)
                    }
                    _ => info!("{} {:?}: {}", name, event.node(), event.name()),
                }
            });
        }
    }

    pub fn run(&mut self) {
        let post = match self.graph.create_model("Post", Attrs::one("id", 1)) {
            Ok(post) => post,
            Err(error) => {
                warn!("cannot create post: {}", error);
                return;
            }
        };
        self.watch(post);

        if let Err(error) = self.graph.fetch(post) {
            warn!("cannot fetch post: {}", error);
            return;
        }
        while self.update() {}

        if let Some(author) = self.graph.related(post, "author") {
            info!(
                "author of post: {}",
                self.graph.get(author, "name").cloned().unwrap_or(Value::Null)
            );
            if let Err(error) = self.graph.set_attr(author, "name", "ann b.") {
                warn!("cannot rename author: {}", error);
            }
        }

        match self.graph.to_json(post, &[]) {
            Ok(json) => info!("post as sent: {}", json),
            Err(error) => warn!("cannot serialize post: {}", error),
        }

        info!("Relgraph Basic Demo finished after {} request(s)", self.request_count);
    }
}

fn main() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();

    let mut app = App::default();
    app.run();
}
