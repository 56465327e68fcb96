//! # Event Ticketing 主程序
//!
//! 通过子命令选择要运行的服务。

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use event_ticketing::{
    Result,
    config::{EventManagerConfig, IdmConfig, UserManagerConfig, load_tuning, process_env},
    event_manager, idm, lerror, linfo,
    logging::{self, LogComponent, LogStage},
    user_manager,
    web::server::shutdown_on_ctrl_c,
};

#[derive(Debug, Parser)]
#[command(name = "event-ticketing", version, about = "Event ticketing services")]
struct Cli {
    /// 日志级别，未设置时读取 `LOG_LEVEL`
    #[arg(long, global = true, env = "LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    service: Service,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum Service {
    /// 活动、套票、包含关系与门票的 REST 服务
    EventManager,
    /// 身份管理 RPC 服务
    Idm,
    /// 用户档案与购票 REST 服务
    UserManager,
}

impl Service {
    const fn name(self) -> &'static str {
        match self {
            Self::EventManager => "event-manager",
            Self::Idm => "idm",
            Self::UserManager => "user-manager",
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.log_level.as_deref());

    let service = cli.service;
    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Main,
        "service_starting",
        &format!("启动服务: {}", service.name())
    );

    if let Err(e) = run(service).await {
        lerror!(
            "system",
            LogStage::Startup,
            LogComponent::Main,
            "service_failed",
            &format!("{} 异常退出: {}", service.name(), e.cause_chain())
        );
        std::process::exit(1);
    }

    linfo!(
        "system",
        LogStage::Shutdown,
        LogComponent::Main,
        "service_shutdown",
        "服务正常关闭"
    );
}

async fn run(service: Service) -> Result<()> {
    let tuning = load_tuning()?;
    let env = process_env();
    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_on_ctrl_c(shutdown.clone()));

    match service {
        Service::EventManager => {
            let config = EventManagerConfig::from_env(&env, tuning)?;
            event_manager::server::run(config, shutdown).await
        }
        Service::Idm => {
            let config = IdmConfig::from_env(&env, tuning)?;
            idm::server::run(config, shutdown).await
        }
        Service::UserManager => {
            let config = UserManagerConfig::from_env(&env, tuning)?;
            user_manager::server::run(config, shutdown).await
        }
    }
}
