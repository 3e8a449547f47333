use std::future::Future;
use tokio::task::JoinSet;

use crate::error::{OmasError, OmasResult};
use crate::model::{FailedItem, FanOutResponse, Guid};

/// Run `operation` for every item concurrently and return the outcomes in
/// input order. Items succeed or fail on their own.
pub async fn run_concurrently<T, F, Fut>(items: Vec<T>, operation: F) -> Vec<OmasResult<Guid>>
where
    T: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = OmasResult<Guid>> + Send + 'static,
{
    let count = items.len();
    let mut tasks = JoinSet::new();
    for (index, item) in items.into_iter().enumerate() {
        let future = operation(item);
        tasks.spawn(async move { (index, future.await) });
    }

    let mut outcomes: Vec<Option<OmasResult<Guid>>> = (0..count).map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, outcome)) => outcomes[index] = Some(outcome),
            Err(e) => log::error!("Concurrent task did not complete: {}", e),
        }
    }

    outcomes
        .into_iter()
        .map(|outcome| {
            outcome.unwrap_or_else(|| Err(OmasError::PropertyServer("task aborted".to_string())))
        })
        .collect()
}

/// Batch variant of `run_concurrently`: failures are collected into the
/// response instead of aborting the batch.
pub async fn fan_out<T, F, Fut>(
    items: Vec<T>,
    identify: impl Fn(&T) -> String,
    operation: F,
) -> FanOutResponse
where
    T: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = OmasResult<Guid>> + Send + 'static,
{
    let identifiers: Vec<String> = items.iter().map(&identify).collect();
    let outcomes = run_concurrently(items, operation).await;

    let mut response = FanOutResponse {
        related_http_code: 200,
        ..Default::default()
    };
    for (identifier, outcome) in identifiers.into_iter().zip(outcomes) {
        match outcome {
            Ok(guid) => response.guids.push(guid),
            Err(e) => {
                log::warn!("{} failed: {}", identifier, e);
                response.failed_items.push(FailedItem {
                    exception_class_name: e.exception_class_name().to_string(),
                    error_message: e.to_string(),
                    identifier,
                });
            }
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failures_are_collected_per_item() {
        let response = fan_out(
            vec![1, 2, 3, 4],
            |n| format!("item-{}", n),
            |n| async move {
                if n % 2 == 0 {
                    Err(OmasError::invalid_parameter("n", "even"))
                } else {
                    Ok(format!("guid-{}", n))
                }
            },
        )
        .await;

        assert_eq!(response.guids, vec!["guid-1", "guid-3"]);
        assert_eq!(response.failed_items.len(), 2);
        assert_eq!(response.failed_items[0].identifier, "item-2");
        assert_eq!(
            response.failed_items[0].exception_class_name,
            "InvalidParameterException"
        );
        assert!(response.has_failures());
    }

    #[tokio::test]
    async fn outcomes_keep_input_order() {
        let outcomes = run_concurrently(vec![30u64, 10, 20], |delay| async move {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
            Ok(delay.to_string())
        })
        .await;
        let guids: Vec<String> = outcomes.into_iter().map(Result::unwrap).collect();
        assert_eq!(guids, vec!["30", "10", "20"]);
    }

    #[tokio::test]
    async fn empty_batches_succeed() {
        let response = fan_out(Vec::<u8>::new(), |n| n.to_string(), |n| async move {
            Ok(n.to_string())
        })
        .await;
        assert!(response.guids.is_empty());
        assert!(!response.has_failures());
    }
}
