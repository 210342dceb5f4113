//! Scripted command runner for tests.
//!
//! Rules are matched in registration order against the program name and a
//! prefix of the argument list. Unmatched invocations succeed with empty
//! output, so tests only script the calls they care about.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::runner::{CommandOutput, CommandRunner, RunOptions};

/// One recorded invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub name: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

#[derive(Debug, Clone)]
enum Response {
    Output(CommandOutput),
    Timeout,
}

#[derive(Debug)]
struct Rule {
    program: String,
    arg_prefix: Vec<String>,
    response: Response,
}

/// A `CommandRunner` that replays scripted responses and records every call.
#[derive(Debug, Default)]
pub struct FakeRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, program: &str, arg_prefix: &[&str], response: Response) {
        self.rules.lock().unwrap().push(Rule {
            program: program.to_string(),
            arg_prefix: arg_prefix.iter().map(|s| s.to_string()).collect(),
            response,
        });
    }

    /// Script a successful invocation with the given stdout.
    pub fn ok(&self, program: &str, arg_prefix: &[&str], stdout: &str) {
        self.push(program, arg_prefix, Response::Output(CommandOutput::ok(stdout)));
    }

    /// Script a failed invocation with the given exit code and stderr.
    pub fn exit(&self, program: &str, arg_prefix: &[&str], code: i32, stderr: &str) {
        self.push(
            program,
            arg_prefix,
            Response::Output(CommandOutput::failed(code, stderr)),
        );
    }

    /// Script a timeout.
    pub fn timeout(&self, program: &str, arg_prefix: &[&str]) {
        self.push(program, arg_prefix, Response::Timeout);
    }

    /// All invocations seen so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Whether any recorded call matches the program and argument prefix.
    pub fn saw(&self, program: &str, arg_prefix: &[&str]) -> bool {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .any(|call| call.name == program && starts_with(&call.args, arg_prefix))
    }
}

fn starts_with(args: &[String], prefix: &[&str]) -> bool {
    args.len() >= prefix.len() && args.iter().zip(prefix).all(|(a, p)| a == p)
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, name: &str, args: &[&str], opts: RunOptions) -> Result<CommandOutput> {
        let args_owned: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        self.calls.lock().unwrap().push(RecordedCall {
            name: name.to_string(),
            args: args_owned.clone(),
            cwd: opts.cwd.clone(),
        });

        let response = {
            let rules = self.rules.lock().unwrap();
            rules
                .iter()
                .find(|rule| {
                    rule.program == name
                        && starts_with(
                            &args_owned,
                            &rule.arg_prefix.iter().map(String::as_str).collect::<Vec<_>>(),
                        )
                })
                .map(|rule| rule.response.clone())
        };

        match response {
            Some(Response::Output(output)) => Ok(output),
            Some(Response::Timeout) => Err(Error::Timeout {
                name: name.to_string(),
                timeout: opts.timeout.unwrap_or(Duration::from_secs(30)),
            }),
            None => Ok(CommandOutput::ok("")),
        }
    }
}
