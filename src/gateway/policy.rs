use super::{CompletionOptions, GatewayError, ModelCallResult, ModelGateway};
use crate::metrics::TaskMetrics;
use std::time::Duration;

/// Timeout and retry rules applied to one gateway call.
///
/// Only transient failures (timeouts, transport errors, HTTP 429/5xx) are retried, and only up
/// to `max_retries` additional attempts of the same call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    /// Deadline for each attempt.
    pub timeout: Duration,
    /// Additional attempts allowed after a transient failure.
    pub max_retries: u32,
    /// Pause between attempts.
    pub retry_backoff: Duration,
}

impl CallPolicy {
    /// Build a policy with the default backoff.
    pub fn new(timeout: Duration, max_retries: u32) -> Self {
        Self {
            timeout,
            max_retries,
            retry_backoff: Duration::from_millis(250),
        }
    }

    /// Run `prompt` through `gateway`, enforcing the deadline and retry budget.
    pub async fn complete(
        &self,
        gateway: &dyn ModelGateway,
        prompt: &str,
        options: &CompletionOptions,
        metrics: &TaskMetrics,
    ) -> Result<ModelCallResult, GatewayError> {
        let mut attempt = 0u32;
        loop {
            metrics.record_model_call();
            let outcome =
                match tokio::time::timeout(self.timeout, gateway.complete(prompt, options, self.timeout))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(GatewayError::Timeout(self.timeout)),
                };

            match outcome {
                Ok(result) => return Ok(result),
                Err(error) if error.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        attempt,
                        max_retries = self.max_retries,
                        error = %error,
                        "Transient model gateway failure; retrying"
                    );
                    if !self.retry_backoff.is_zero() {
                        tokio::time::sleep(self.retry_backoff).await;
                    }
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::TokenUsage;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedGateway {
        script: Mutex<Vec<Result<&'static str, GatewayError>>>,
        delay: Duration,
    }

    impl ScriptedGateway {
        fn new(mut script: Vec<Result<&'static str, GatewayError>>) -> Self {
            script.reverse();
            Self {
                script: Mutex::new(script),
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl ModelGateway for ScriptedGateway {
        async fn complete(
            &self,
            _prompt: &str,
            options: &CompletionOptions,
            _timeout: Duration,
        ) -> Result<ModelCallResult, GatewayError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let next = self.script.lock().unwrap().pop().expect("script exhausted");
            next.map(|text| ModelCallResult {
                text: text.to_string(),
                token_usage: TokenUsage::default(),
                model_id: options.model_id.clone(),
            })
        }
    }

    fn options() -> CompletionOptions {
        CompletionOptions {
            max_tokens: 16,
            temperature: 0.1,
            model_id: "test-model".into(),
        }
    }

    fn policy(max_retries: u32) -> CallPolicy {
        CallPolicy {
            timeout: Duration::from_millis(200),
            max_retries,
            retry_backoff: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn retries_transient_failures_within_budget() {
        let gateway = ScriptedGateway::new(vec![
            Err(GatewayError::Status {
                status: 503,
                body: "busy".into(),
            }),
            Err(GatewayError::Transport("reset".into())),
            Ok("done"),
        ]);
        let metrics = TaskMetrics::new();

        let result = policy(2)
            .complete(&gateway, "prompt", &options(), &metrics)
            .await
            .expect("third attempt succeeds");

        assert_eq!(result.text, "done");
        assert_eq!(metrics.snapshot().model_calls, 3);
    }

    #[tokio::test]
    async fn stops_when_budget_is_exhausted() {
        let gateway = ScriptedGateway::new(vec![
            Err(GatewayError::Transport("reset".into())),
            Err(GatewayError::Transport("reset again".into())),
        ]);
        let metrics = TaskMetrics::new();

        let error = policy(1)
            .complete(&gateway, "prompt", &options(), &metrics)
            .await
            .unwrap_err();

        assert!(matches!(error, GatewayError::Transport(message) if message == "reset again"));
        assert_eq!(metrics.snapshot().model_calls, 2);
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let gateway = ScriptedGateway::new(vec![Err(GatewayError::Auth { status: 401 })]);
        let metrics = TaskMetrics::new();

        let error = policy(2)
            .complete(&gateway, "prompt", &options(), &metrics)
            .await
            .unwrap_err();

        assert!(matches!(error, GatewayError::Auth { status: 401 }));
        assert_eq!(metrics.snapshot().model_calls, 1);
    }

    #[tokio::test]
    async fn slow_calls_become_timeouts() {
        let mut gateway = ScriptedGateway::new(vec![Ok("late")]);
        gateway.delay = Duration::from_secs(5);
        let metrics = TaskMetrics::new();

        let error = policy(0)
            .complete(&gateway, "prompt", &options(), &metrics)
            .await
            .unwrap_err();

        assert!(error.is_timeout());
    }
}
