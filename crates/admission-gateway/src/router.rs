//! Route table and its composition.
//!
//! `RouteComposer` registers `(method, pattern, contract, handlers)` tuples
//! and puts the shared chain guard in front of every handler list. The
//! `get`/`post` helpers go through the same `route` call, so no route can be
//! registered without the guard.
//!
//! `RouteTable::build` registers the gateway's routes once, at startup. The
//! full-node block is included only when the node is not running in
//! VDE-only mode; the flag is read once here and never per request.
//!
//! Patterns that differ only in parameter names (`GET contract/:name` and
//! `POST contract/:request_id`) are mounted on one canonical path shape
//! (`contract/:p0`); each route keeps its own names for its handlers.

use crate::domain::context::RequestContext;
use crate::domain::error::{ApiError, ApiResult, ErrorKind, RouteError};
use crate::domain::params::ParamContract;
use crate::domain::config::CorsConfig;
use crate::handlers::{fetch_binary, ContractOp, ContractState, Delegate};
use crate::middleware::{
    bearer_token, collect_params, preflight_response, Chain, ChainGuard, Reply, SharedHandler,
    WalletAuth,
};
use crate::ports::{BinaryStore, BusinessBackend, Collaborators};
use axum::extract::{Path, Request};
use axum::http::{Method, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, MethodFilter, MethodRouter};
use axum::Router;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info};

/// One registered route.
#[derive(Debug)]
pub struct RouteEntry {
    pub method: Method,
    /// Pattern as registered, relative to the api prefix
    pub pattern: String,
    /// Pattern with parameters renamed positionally (`:p0`, `:p1`, ...)
    pub shape: String,
    /// Parameter names of `pattern`, in path order
    pub path_names: Vec<String>,
    pub contract: ParamContract,
    /// Guard first, then the registered handlers
    pub chain: Chain,
    filter: MethodFilter,
}

impl RouteEntry {
    /// Map positional path values back to this route's own names
    fn name_path(&self, mut raw: HashMap<String, String>) -> HashMap<String, String> {
        self.path_names
            .iter()
            .enumerate()
            .filter_map(|(i, name)| raw.remove(&format!("p{i}")).map(|v| (name.clone(), v)))
            .collect()
    }
}

/// Split a pattern into its canonical shape and parameter names.
pub fn path_shape(pattern: &str) -> (String, Vec<String>) {
    let mut names = Vec::new();
    let shape = pattern
        .split('/')
        .map(|segment| match segment.strip_prefix(':') {
            Some(name) => {
                let canonical = format!(":p{}", names.len());
                names.push(name.to_string());
                canonical
            }
            None => segment.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/");
    (shape, names)
}

/// Builds route entries, prepending the shared guard to each.
pub struct RouteComposer {
    guard: SharedHandler,
    entries: Vec<RouteEntry>,
    seen: HashSet<(Method, String)>,
}

impl RouteComposer {
    pub fn new(guard: SharedHandler) -> Self {
        Self {
            guard,
            entries: Vec::new(),
            seen: HashSet::new(),
        }
    }

    pub fn get(
        &mut self,
        pattern: &str,
        params: &str,
        handlers: Vec<SharedHandler>,
    ) -> Result<(), RouteError> {
        self.route(Method::GET, pattern, params, handlers)
    }

    pub fn post(
        &mut self,
        pattern: &str,
        params: &str,
        handlers: Vec<SharedHandler>,
    ) -> Result<(), RouteError> {
        self.route(Method::POST, pattern, params, handlers)
    }

    /// Register one route. Fails on a malformed contract or a second
    /// registration of the same method and path shape.
    pub fn route(
        &mut self,
        method: Method,
        pattern: &str,
        params: &str,
        handlers: Vec<SharedHandler>,
    ) -> Result<(), RouteError> {
        let contract = ParamContract::compile(params).map_err(|source| {
            error!(
                method = %method,
                pattern = pattern,
                parameter = %source,
                "Incorrect api route parameters"
            );
            RouteError::Contract {
                method: method.to_string(),
                pattern: pattern.to_string(),
                source,
            }
        })?;

        let filter = MethodFilter::try_from(method.clone()).map_err(|_| RouteError::Method {
            method: method.to_string(),
            pattern: pattern.to_string(),
        })?;

        let (shape, path_names) = path_shape(pattern);
        if !self.seen.insert((method.clone(), shape.clone())) {
            return Err(RouteError::Duplicate {
                method: method.to_string(),
                pattern: pattern.to_string(),
            });
        }

        let mut chain = Vec::with_capacity(handlers.len() + 1);
        chain.push(Arc::clone(&self.guard));
        chain.extend(handlers);

        self.entries.push(RouteEntry {
            method,
            pattern: pattern.to_string(),
            shape,
            path_names,
            contract,
            chain: Chain::new(chain),
            filter,
        });
        Ok(())
    }

    pub fn finish(self) -> Vec<RouteEntry> {
        self.entries
    }
}

/// Pipeline steps the route table is assembled from.
pub struct RouteHandlers {
    pub guard: SharedHandler,
    pub auth: SharedHandler,
    pub contracts: Arc<ContractState>,
    pub backend: Arc<dyn BusinessBackend>,
}

impl RouteHandlers {
    pub fn new(collaborators: &Collaborators, contracts: Arc<ContractState>) -> Self {
        Self {
            guard: Arc::new(ChainGuard::new(Arc::clone(&collaborators.chain))),
            auth: Arc::new(WalletAuth::new(Arc::clone(&collaborators.authenticator))),
            contracts,
            backend: Arc::clone(&collaborators.backend),
        }
    }
}

/// Immutable registry of every composed route.
pub struct RouteTable {
    entries: Vec<Arc<RouteEntry>>,
    guard: SharedHandler,
    supporting_vde: bool,
}

impl RouteTable {
    pub fn build(handlers: &RouteHandlers, supporting_vde: bool) -> Result<Self, RouteError> {
        let mut r = RouteComposer::new(Arc::clone(&handlers.guard));
        let auth = || Arc::clone(&handlers.auth);
        let guard = || Arc::clone(&handlers.guard);
        let call = |endpoint: &'static str| Delegate::shared(endpoint, &handlers.backend);
        let contract = |op: ContractOp| handlers.contracts.handler(op);

        r.get("contract/:name", "", vec![auth(), call("getContract")])?;
        r.get("contracts", "?limit ?offset:int64", vec![auth(), call("getContracts")])?;
        r.get("getuid", "", vec![call("getUID")])?;
        r.get(
            "list/:name",
            "?limit ?offset:int64,?columns:string",
            vec![auth(), call("list")],
        )?;
        r.get("row/:name/:id", "?columns:string", vec![auth(), call("row")])?;
        r.get("interface/page/:name", "", vec![auth(), call("getPageRow")])?;
        r.get("interface/menu/:name", "", vec![auth(), call("getMenuRow")])?;
        r.get(
            "interface/block/:name",
            "",
            vec![auth(), call("getBlockInterfaceRow")],
        )?;
        r.get("table/:name", "", vec![auth(), call("table")])?;
        r.get("tables", "?limit ?offset:int64", vec![auth(), call("tables")])?;
        r.get("test/:name", "", vec![call("getTest")])?;
        r.get("version", "", vec![call("getVersion")])?;
        r.get("avatar/:ecosystem/:member", "", vec![call("getAvatar")])?;
        r.get("config/:option", "", vec![call("getConfigOption")])?;
        r.get("ecosystemname", "?id:int64", vec![call("getEcosystemName")])?;
        r.post("content/source/:name", "", vec![auth(), call("getSource")])?;
        r.post("content/page/:name", "?lang:string", vec![auth(), call("getPage")])?;
        r.post("content/menu/:name", "?lang:string", vec![auth(), call("getMenu")])?;
        r.post("content/hash/:name", "", vec![call("getPageHash")])?;
        r.post(
            "login",
            "?pubkey signature:hex,?key_id ?mobile:string,?ecosystem ?expire ?role_id:int64",
            vec![call("login")],
        )?;
        r.post(
            "prepare/:name",
            "?token_ecosystem:int64,?max_sum ?payover:string",
            vec![auth(), contract(ContractOp::Prepare)],
        )?;
        r.post(
            "prepareMultiple",
            "data:string",
            vec![auth(), contract(ContractOp::PrepareMultiple)],
        )?;
        r.post("txstatusMultiple", "data:string", vec![auth(), call("txstatusMulti")])?;
        r.post(
            "contract/:request_id",
            "?pubkey signature:hex, time:string, ?token_ecosystem:int64,?max_sum ?payover:string",
            vec![auth(), guard(), contract(ContractOp::Submit)],
        )?;
        r.post(
            "contractMultiple/:request_id",
            "data:string",
            vec![auth(), guard(), contract(ContractOp::SubmitMultiple)],
        )?;
        r.post("refresh", "token:string,?expire:int64", vec![call("refresh")])?;
        r.post("test/:name", "", vec![call("getTest")])?;
        r.post("content", "template ?source:string", vec![call("jsonContent")])?;
        r.post("updnotificator", "ids:string", vec![call("updateNotificator")])?;
        r.get(
            "ecosystemparam/:name",
            "?ecosystem:int64",
            vec![auth(), call("ecosystemParam")],
        )?;
        r.route(
            Method::POST,
            "node/:name",
            "?token_ecosystem:int64,?max_sum ?payover:string",
            vec![contract(ContractOp::Node)],
        )?;

        if !supporting_vde {
            r.get("txstatus/:hash", "", vec![auth(), call("txstatus")])?;
            r.get("txstatusMultiple", "data:string", vec![auth(), call("txstatusMulti")])?;
            r.get(
                "appparam/:appid/:name",
                "?ecosystem:int64",
                vec![auth(), call("appParam")],
            )?;
            r.get(
                "appparams/:appid",
                "?ecosystem:int64,?names:string",
                vec![auth(), call("appParams")],
            )?;
            r.get("history/:table/:id", "", vec![auth(), call("getHistory")])?;
            r.get("balance/:wallet", "?ecosystem:int64", vec![auth(), call("balance")])?;
            r.get("block/:id", "", vec![call("getBlockInfo")])?;
            r.get("maxblockid", "", vec![call("getMaxBlockID")])?;

            r.get(
                "ecosystemparams",
                "?ecosystem:int64,?names:string",
                vec![auth(), call("ecosystemParams")],
            )?;
            r.get("systemparams", "?names:string", vec![auth(), call("systemParams")])?;
            r.get("ecosystems", "", vec![auth(), call("ecosystems")])?;
        }

        let entries: Vec<Arc<RouteEntry>> = r.finish().into_iter().map(Arc::new).collect();
        info!(
            routes = entries.len(),
            supporting_vde = supporting_vde,
            "Route table built"
        );

        Ok(Self {
            entries,
            guard: Arc::clone(&handlers.guard),
            supporting_vde,
        })
    }

    pub fn entries(&self) -> &[Arc<RouteEntry>] {
        &self.entries
    }

    pub fn find(&self, method: &Method, pattern: &str) -> Option<&RouteEntry> {
        self.entries
            .iter()
            .find(|e| e.method == *method && e.pattern == pattern)
            .map(Arc::as_ref)
    }

    /// The guard every route starts with
    pub fn guard(&self) -> &SharedHandler {
        &self.guard
    }

    pub fn supporting_vde(&self) -> bool {
        self.supporting_vde
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mount every route under `api_path`, plus the OPTIONS and binary data
    /// routes, which bypass the composer.
    pub fn router(&self, api_path: &str, cors: &CorsConfig, store: Arc<dyn BinaryStore>) -> Router {
        let cors = Arc::new(cors.clone());
        let preflight = {
            let cors = Arc::clone(&cors);
            move || {
                let cors = Arc::clone(&cors);
                async move { preflight_response(&cors) }
            }
        };

        let mut shapes: BTreeMap<&str, MethodRouter> = BTreeMap::new();
        for entry in &self.entries {
            let method_router = shapes
                .remove(entry.shape.as_str())
                .unwrap_or_else(|| MethodRouter::new().options(preflight.clone()));

            let route = Arc::clone(entry);
            let handler = move |path: Option<Path<HashMap<String, String>>>, request: Request| {
                let route = Arc::clone(&route);
                async move {
                    let raw = path.map(|Path(raw)| raw).unwrap_or_default();
                    dispatch(&route, raw, request).await
                }
            };
            shapes.insert(entry.shape.as_str(), method_router.on(entry.filter, handler));
        }

        let mut router = Router::new();
        for (shape, method_router) in shapes {
            router = router.route(&format!("{api_path}{shape}"), method_router);
        }

        let data = Router::new()
            .route(
                &format!("{api_path}data/:table/:id/:column/:hash"),
                get(fetch_binary).options(preflight),
            )
            .with_state(store);

        let prefix = api_path.to_string();
        router.merge(data).fallback(move |method: Method, uri: Uri| {
            let cors = Arc::clone(&cors);
            let prefix = prefix.clone();
            async move {
                if method == Method::OPTIONS && uri.path().starts_with(&prefix) {
                    preflight_response(&cors)
                } else {
                    ApiError::not_found(format!("route {} {}", method, uri.path())).into_response()
                }
            }
        })
    }
}

/// Validate the request against the route contract and run its chain.
async fn dispatch(route: &RouteEntry, raw_path: HashMap<String, String>, request: Request) -> Response {
    let result = run_route(route, raw_path, request).await;
    if let Err(e) = &result {
        match e.kind {
            ErrorKind::Internal => error!(route = %route.pattern, error = %e, "Route failed"),
            _ => debug!(route = %route.pattern, error = %e, "Route refused request"),
        }
    }
    result.into_response()
}

async fn run_route(
    route: &RouteEntry,
    raw_path: HashMap<String, String>,
    request: Request,
) -> ApiResult<Reply> {
    let bearer = bearer_token(request.headers());
    let form = collect_params(request).await?;
    let params = route.contract.validate(&form)?;

    let mut ctx = RequestContext {
        method: route.method.to_string(),
        route: route.pattern.clone(),
        path: route.name_path(raw_path),
        form,
        params,
        bearer_token: bearer,
        session: None,
    };
    route.chain.run(&mut ctx).await
}
