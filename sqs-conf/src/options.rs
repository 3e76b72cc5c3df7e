use structopt::StructOpt;

use crate::Env;

#[derive(StructOpt, Debug, Clone, Default)]
#[structopt(name = "sqsd", about = "Simple queue service node")]
pub struct Options {
    /// Config filename
    #[structopt(name = "config", short = "f", long)]
    pub cfg_name: Option<String>,

    /// Deployment environment: production, development or test
    #[structopt(name = "env", long)]
    pub env: Option<Env>,

    /// HTTP listen address, --laddr "0.0.0.0:5446"
    #[structopt(name = "laddr", long)]
    pub laddr: Option<String>,

    /// Address other nodes and clients use to reach this node, --addr "10.0.0.2:5446"
    #[structopt(name = "addr", long)]
    pub addr: Option<String>,
}
