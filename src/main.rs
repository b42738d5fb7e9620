use clap::{Parser, Subcommand};
use k8s_openapi::serde_json;
use navidash::channels::{NamespaceScope, ResourceChannels};
use navidash::config::DashboardConfig;
use navidash::dataselect::DataSelectQuery;
use navidash::k8s::client;
use navidash::k8s::metrics_client::MetricsServerSource;
use navidash::k8s::source::KubeSource;
use navidash::metric::MetricSource;
use navidash::resource::{
    custom, deployment, event, job, namespace, node, pod, replicaset, service,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Namespace to read from; repeat for several
    #[arg(short, long, global = true)]
    namespace: Vec<String>,

    /// Read from every namespace
    #[arg(short = 'A', long, global = true)]
    all_namespaces: bool,

    /// Comma separated property,value pairs, e.g. `name,web,status,Running`
    #[arg(long, global = true)]
    filter: Option<String>,

    /// Comma separated direction,property pairs, e.g. `d,creationTimestamp,a,name`
    #[arg(long, global = true)]
    sort: Option<String>,

    #[arg(long, global = true)]
    items_per_page: Option<String>,

    #[arg(long, global = true)]
    page: Option<String>,

    /// none, items, cumulative or both
    #[arg(long, global = true)]
    metrics: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Pods,
    Pod { name: String },
    Deployments,
    Deployment { name: String },
    Replicasets,
    Replicaset { name: String },
    Services,
    Service { name: String },
    Jobs,
    /// Events in scope, or only those about the named object
    Events { involved: Option<String> },
    Namespaces,
    Nodes,
    /// Objects of a custom resource, or one of them by name
    Custom {
        group: String,
        version: String,
        kind: String,
        plural: String,
        name: Option<String>,
    },
}

impl Args {
    fn scope(&self) -> NamespaceScope {
        if self.all_namespaces {
            NamespaceScope::All
        } else if self.namespace.is_empty() {
            NamespaceScope::same("default")
        } else {
            NamespaceScope::from_namespaces(self.namespace.clone())
        }
    }

    /// Namespace of a detail view
    fn namespace(&self) -> &str {
        self.namespace.first().map_or("default", String::as_str)
    }

    fn query(&self) -> navidash::Result<DataSelectQuery> {
        Ok(DataSelectQuery::from_params(
            self.filter.as_deref(),
            self.sort.as_deref(),
            self.items_per_page.as_deref(),
            self.page.as_deref(),
            self.metrics.as_deref(),
        )?)
    }
}

fn print<T: Serialize>(view: &T) -> navidash::Result<()> {
    println!("{}", serde_json::to_string_pretty(view)?);
    Ok(())
}

async fn run(args: Args, config: DashboardConfig) -> navidash::Result<()> {
    let client = client::new(Some(&config.user_agent)).await?;
    let channels = ResourceChannels::new(Arc::new(KubeSource::new(client.clone())));
    let metrics: Option<Arc<dyn MetricSource>> = config.metrics_enabled.then(|| {
        Arc::new(MetricsServerSource::new(client, config.metric_concurrency))
            as Arc<dyn MetricSource>
    });

    let scope = args.scope();
    let ns = args.namespace();
    let query = args.query()?;
    debug!("Query: {:?}", query);

    match &args.command {
        Command::Pods => print(&pod::get_pod_list(&channels, metrics, &scope, &query).await?),
        Command::Pod { name } => print(&pod::get_pod_detail(&channels, metrics, ns, name).await?),
        Command::Deployments => print(
            &deployment::get_deployment_list(&channels, metrics, &scope, &query).await?,
        ),
        Command::Deployment { name } => print(
            &deployment::get_deployment_detail(&channels, metrics, ns, name, &query).await?,
        ),
        Command::Replicasets => print(
            &replicaset::get_replica_set_list(&channels, metrics, &scope, &query).await?,
        ),
        Command::Replicaset { name } => print(
            &replicaset::get_replica_set_detail(&channels, metrics, ns, name, &query).await?,
        ),
        Command::Services => print(&service::get_service_list(&channels, &scope, &query).await?),
        Command::Service { name } => print(
            &service::get_service_detail(&channels, metrics, ns, name, &query).await?,
        ),
        Command::Jobs => print(&job::get_job_list(&channels, metrics, &scope, &query).await?),
        Command::Events { involved: None } => {
            print(&event::get_event_list(&channels, &scope, &query).await?)
        }
        Command::Events {
            involved: Some(name),
        } => print(&event::get_events_for_resource(&channels, ns, name, &query).await?),
        Command::Namespaces => print(&namespace::get_namespace_list(&channels, &query).await?),
        Command::Nodes => print(&node::get_node_list(&channels, metrics, &query).await?),
        Command::Custom {
            group,
            version,
            kind,
            plural,
            name,
        } => {
            let resource = custom::api_resource(group, version, kind, plural);
            match name {
                Some(name) => {
                    let namespace = (!args.all_namespaces).then_some(ns);
                    print(
                        &custom::get_custom_object_detail(&channels, &resource, namespace, name)
                            .await?,
                    )
                }
                None => print(
                    &custom::get_custom_object_list(&channels, &resource, &scope, &query).await?,
                ),
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        debug!("rustls crypto provider already installed");
    }

    let args = Args::parse();
    let config = DashboardConfig::from_env();

    if let Err(e) = run(args, config).await {
        error!("{}", e);
        eprintln!("error ({}): {}", e.status_code(), e);
        std::process::exit(1);
    }
    Ok(())
}
