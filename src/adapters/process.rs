use crate::domain::model::ProxyAction;
use crate::domain::ports::{CommandOutput, CommandRunner, ProcessController};
use crate::utils::error::{Result, SiteError};
use async_trait::async_trait;

/// 以 `tokio::process` 執行外部指令
#[derive(Debug, Clone, Default)]
pub struct TokioCommandRunner;

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        tracing::debug!("$ {} {}", program, args.join(" "));
        let output = tokio::process::Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| SiteError::CommandFailed {
                command: command_line(program, args),
                message: e.to_string(),
            })?;

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

pub(crate) fn command_line(program: &str, args: &[String]) -> String {
    std::iter::once(program.to_string())
        .chain(args.iter().cloned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// 執行指令並要求結束碼為 0。`sudo` 為 true 時以 `sudo program args...` 執行
pub(crate) async fn run_checked<R: CommandRunner + ?Sized>(
    runner: &R,
    sudo: bool,
    program: &str,
    args: Vec<String>,
) -> Result<CommandOutput> {
    let (program, args) = if sudo {
        let mut full = vec![program.to_string()];
        full.extend(args);
        ("sudo", full)
    } else {
        (program, args)
    };

    let output = runner.run(program, &args).await?;
    if output.success() {
        return Ok(output);
    }

    let detail = if output.stderr.trim().is_empty() {
        output.stdout.trim().to_string()
    } else {
        output.stderr.trim().to_string()
    };
    Err(SiteError::CommandFailed {
        command: command_line(program, &args),
        message: match output.status {
            Some(code) => format!("exit status {}: {}", code, detail),
            None => format!("terminated by signal: {}", detail),
        },
    })
}

/// `[sudo] service nginx reload|start|stop`
pub struct ServiceController<R: CommandRunner> {
    runner: R,
    service: String,
    use_sudo: bool,
}

impl<R: CommandRunner> ServiceController<R> {
    pub fn new(runner: R, service: impl Into<String>, use_sudo: bool) -> Self {
        Self {
            runner,
            service: service.into(),
            use_sudo,
        }
    }
}

#[async_trait]
impl<R: CommandRunner> ProcessController for ServiceController<R> {
    async fn control(&self, action: ProxyAction) -> Result<()> {
        run_checked(
            &self.runner,
            self.use_sudo,
            "service",
            vec![self.service.clone(), action.to_string()],
        )
        .await
        .map(|_| ())
        .map_err(|e| {
            tracing::error!("❌ service {} {} failed: {}", self.service, action, e);
            SiteError::ProcessControlFailed {
                action: action.to_string(),
                message: e.to_string(),
            }
        })
    }
}
