#[cfg(test)]
mod tests {
    use std::time::Duration;

    use eyre::{Result, eyre};
    use queue::{JOB_QUEUE, MemoryQueue, MessageQueue, QueueError};

    #[tokio::test]
    async fn test_deliveries_arrive_in_publish_order() -> Result<()> {
        let queue = MemoryQueue::new();
        for number in ["101", "102", "103"] {
            queue.publish(JOB_QUEUE, number).await?;
        }

        let mut sub = queue.consume(JOB_QUEUE, "test", 3).await?;
        let mut seen = Vec::new();
        for _ in 0..3 {
            let delivery = sub.next().await.ok_or_else(|| eyre!("subscription ended"))?;
            seen.push(delivery.payload().to_string());
            delivery.ack().await?;
        }

        assert_eq!(seen, vec!["101", "102", "103"]);
        assert_eq!(queue.ready(JOB_QUEUE), 0);
        assert_eq!(queue.unacked(JOB_QUEUE), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_prefetch_holds_back_until_ack() -> Result<()> {
        let queue = MemoryQueue::new();
        queue.publish(JOB_QUEUE, "1").await?;
        queue.publish(JOB_QUEUE, "2").await?;

        let mut sub = queue.consume(JOB_QUEUE, "test", 1).await?;
        let first = sub.next().await.ok_or_else(|| eyre!("subscription ended"))?;
        assert_eq!(first.payload(), "1");

        let blocked = tokio::time::timeout(Duration::from_millis(50), sub.next()).await;
        assert!(blocked.is_err(), "second delivery must wait for the first ack");
        assert_eq!(queue.unacked(JOB_QUEUE), 1);

        first.ack().await?;
        let second = sub.next().await.ok_or_else(|| eyre!("subscription ended"))?;
        assert_eq!(second.payload(), "2");
        second.ack().await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_nack_with_requeue_redelivers_first() -> Result<()> {
        let queue = MemoryQueue::new();
        queue.publish(JOB_QUEUE, "7").await?;
        queue.publish(JOB_QUEUE, "8").await?;

        let mut sub = queue.consume(JOB_QUEUE, "test", 1).await?;
        let delivery = sub.next().await.ok_or_else(|| eyre!("subscription ended"))?;
        delivery.nack(true).await?;

        let again = sub.next().await.ok_or_else(|| eyre!("subscription ended"))?;
        assert_eq!(again.payload(), "7");
        again.ack().await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_nack_without_requeue_drops() -> Result<()> {
        let queue = MemoryQueue::new();
        queue.publish(JOB_QUEUE, "not-a-number").await?;
        queue.publish(JOB_QUEUE, "9").await?;

        let mut sub = queue.consume(JOB_QUEUE, "test", 1).await?;
        let bad = sub.next().await.ok_or_else(|| eyre!("subscription ended"))?;
        bad.nack(false).await?;

        let next = sub.next().await.ok_or_else(|| eyre!("subscription ended"))?;
        assert_eq!(next.payload(), "9");
        next.ack().await?;
        assert!(queue.peek(JOB_QUEUE).is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_close_ends_subscriptions_and_publishes() -> Result<()> {
        let queue = MemoryQueue::new();
        let mut sub = queue.consume(JOB_QUEUE, "test", 1).await?;

        queue.close().await?;
        queue.close().await?;

        assert!(sub.next().await.is_none());
        let err = queue.publish(JOB_QUEUE, "1").await.unwrap_err();
        assert!(matches!(err, QueueError::Closed));
        Ok(())
    }

    #[tokio::test]
    async fn test_connect_by_url() -> Result<()> {
        let queue = queue::connect("memory://").await?;
        queue.publish(JOB_QUEUE, "1").await?;

        let err = queue::connect("amqp://localhost").await.err();
        assert!(matches!(err, Some(QueueError::UnsupportedUrl(_))));
        Ok(())
    }
}
