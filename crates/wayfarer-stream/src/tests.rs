//! Turn-level tests for the streaming engine

#[cfg(test)]
mod tests {
    use crate::{
        ChannelEvent, ChannelName, SpanStatus, StreamConfig, TurnChannels, TurnError, TurnEvent,
        TurnRunner,
    };
    use std::time::Duration;
    use wayfarer_domain::traits::{FragmentSource, TurnStore};
    use wayfarer_domain::{ChatId, Enrichment, Fragment};
    use wayfarer_llm::{LlmError, MockEnricher, ScriptedSource};
    use wayfarer_store::MemoryStore;

    type Runner = TurnRunner<MockEnricher, MockEnricher, MemoryStore>;

    fn runner(enricher: MockEnricher) -> Runner {
        runner_with(enricher, StreamConfig::default())
    }

    fn runner_with(enricher: MockEnricher, config: StreamConfig) -> Runner {
        TurnRunner::new(enricher.clone(), enricher, MemoryStore::new(), config).unwrap()
    }

    fn paris_enricher() -> MockEnricher {
        MockEnricher::new()
            .with_description("Paris", "Eiffel Tower", "Wrought-iron lattice tower")
            .with_reference("Eiffel Tower", "https://example.com/eiffel.jpg")
    }

    async fn timeline(mut channels: TurnChannels) -> Vec<TurnEvent> {
        let mut events = Vec::new();
        while let Some(event) = channels.timeline.recv().await {
            events.push(event);
        }
        events
    }

    fn text_appends(events: &[TurnEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                TurnEvent::Text(ChannelEvent::Append(text)) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    fn done_index(events: &[TurnEvent], channel: ChannelName) -> usize {
        events
            .iter()
            .position(|e| e.channel() == channel && e.is_done())
            .unwrap()
    }

    fn saved(runner: &Runner, chat_id: &ChatId) -> usize {
        runner.store().lock().unwrap().load_turns(chat_id).unwrap().len()
    }

    /// Yields only the completion signal, as a non-streaming source would
    struct CompletionOnly(Option<String>);

    impl FragmentSource for CompletionOnly {
        type Error = LlmError;

        async fn next_fragment(&mut self) -> Result<Option<Fragment>, LlmError> {
            Ok(self.0.take().map(Fragment::done))
        }
    }

    #[tokio::test]
    async fn test_eiffel_tower_scenario() {
        let runner = runner(paris_enricher());
        let chat_id = ChatId::new();
        let (turn, channels) = runner.start(chat_id.clone());
        let turn_id = turn.id();

        let source = ScriptedSource::new([
            "The ",
            "Eiffel Tower is in [[",
            "Paris",
            "]]",
            ", a great city.",
        ]);
        let outcome = turn.run(source).await.unwrap();
        let events = timeline(channels).await;

        assert_eq!(
            text_appends(&events),
            vec!["The ", "Eiffel Tower is in ", ", a great city."]
        );
        assert_eq!(outcome.record.id, turn_id);
        assert_eq!(outcome.record.text, "The Eiffel Tower is in , a great city.");
        assert_eq!(outcome.record.location.as_deref(), Some("Paris"));
        assert!(!outcome.record.aborted);

        let landmark = outcome.record.landmark.clone().unwrap();
        assert_eq!(landmark.url, "https://example.com/eiffel.jpg");
        assert_eq!(landmark.info, "Wrought-iron lattice tower");

        let enrichment = outcome.enrichment.unwrap();
        assert_eq!(
            enrichment.to_string(),
            "Paris: https://example.com/eiffel.jpg : Wrought-iron lattice tower"
        );
        assert_eq!(outcome.metrics.spans_sealed, 1);
        assert_eq!(outcome.metrics.enrichments_resolved, 1);
        assert_eq!(saved(&runner, &chat_id), 1);
    }

    #[tokio::test]
    async fn test_split_delimiter_turn() {
        let runner = runner(MockEnricher::new());
        let (turn, channels) = runner.start(ChatId::new());

        let outcome = turn
            .run(ScriptedSource::new(["I recommend [", "[Par", "is]]."]))
            .await
            .unwrap();
        let events = timeline(channels).await;

        assert_eq!(text_appends(&events), vec!["I recommend ", "."]);
        assert!(events.contains(&TurnEvent::SpanStatus(ChannelEvent::Done(Some(
            SpanStatus::Sealed("Paris".to_string())
        )))));
        assert_eq!(outcome.record.location.as_deref(), Some("Paris"));
    }

    #[tokio::test]
    async fn test_no_delimiter_closes_side_channels_empty() {
        let runner = runner(MockEnricher::new());
        let chat_id = ChatId::new();
        let (turn, channels) = runner.start(chat_id.clone());

        let outcome = turn
            .run(ScriptedSource::new(["Just ", "some ", "advice."]))
            .await
            .unwrap();

        let span = channels.span_status.collect().await;
        assert!(span.finished && span.appended.is_empty() && span.done.is_none());
        let enrichment = channels.enrichment.collect().await;
        assert!(enrichment.finished && enrichment.done.is_none());
        let text = channels.text.collect().await;
        assert_eq!(text.appended.concat(), "Just some advice.");
        assert_eq!(text.done.as_deref(), Some("Just some advice."));

        assert_eq!(outcome.record.text, "Just some advice.");
        assert!(outcome.record.location.is_none());
        assert!(outcome.record.landmark.is_none());
        assert!(outcome.enrichment.is_none());
        assert_eq!(saved(&runner, &chat_id), 1);
    }

    #[tokio::test]
    async fn test_channel_close_order_with_slow_enrichment() {
        let enricher = paris_enricher().with_delay(Duration::from_millis(50));
        let runner = runner(enricher);
        let (turn, channels) = runner.start(ChatId::new());

        turn.run(ScriptedSource::new(["Go to [[Paris]]", " now", " please"]))
            .await
            .unwrap();
        let events = timeline(channels).await;

        let span_done = done_index(&events, ChannelName::SpanStatus);
        let enrichment_done = done_index(&events, ChannelName::Enrichment);
        let text_done = done_index(&events, ChannelName::Text);
        assert!(span_done < enrichment_done);
        assert!(enrichment_done < text_done);

        // Text content is not held back by the lookup
        let last_text_append = events
            .iter()
            .rposition(|e| matches!(e, TurnEvent::Text(ChannelEvent::Append(_))))
            .unwrap();
        assert!(last_text_append < enrichment_done);
        assert_eq!(events.iter().filter(|e| e.is_done()).count(), 3);
    }

    #[tokio::test]
    async fn test_enrichment_failure_degrades_and_finalizes() {
        let runner = runner(MockEnricher::new().failing_describe("Atlantis"));
        let chat_id = ChatId::new();
        let (turn, channels) = runner.start(chat_id.clone());

        let outcome = turn
            .run(ScriptedSource::new(["Sail to [[Atlantis]]!"]))
            .await
            .unwrap();

        let log = channels.enrichment.collect().await;
        let payload = log.done.unwrap();
        assert!(payload.is_degraded());
        assert_eq!(payload.to_string(), "Atlantis");

        assert_eq!(outcome.record.location.as_deref(), Some("Atlantis"));
        assert!(outcome.record.landmark.is_none());
        assert_eq!(outcome.metrics.enrichments_degraded, 1);
        assert_eq!(saved(&runner, &chat_id), 1);
    }

    #[tokio::test]
    async fn test_enrichment_json_carries_status_tag() {
        let runner = runner(paris_enricher());
        let (turn, _channels) = runner.start(ChatId::new());

        let outcome = turn.run(ScriptedSource::new(["[[Paris]]"])).await.unwrap();
        let enrichment = outcome.enrichment.unwrap();

        let json = serde_json::to_value(&enrichment).unwrap();
        assert_eq!(json["status"], "resolved");
        assert_eq!(json["entity"], "Paris");
        assert_eq!(json["result"]["locator"], "https://example.com/eiffel.jpg");

        let parsed: Enrichment = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, enrichment);

        let degraded = Enrichment::Degraded {
            entity: "Atlantis".to_string(),
            reason: "describe failed".to_string(),
        };
        let json = serde_json::to_value(&degraded).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(serde_json::from_value::<Enrichment>(json).unwrap(), degraded);
    }

    #[tokio::test]
    async fn test_resolver_failure_degrades() {
        let enricher = MockEnricher::new()
            .with_description("Rome", "Colosseum", "Amphitheatre")
            .failing_resolve("Colosseum");
        let runner = runner(enricher);
        let (turn, _channels) = runner.start(ChatId::new());

        let outcome = turn.run(ScriptedSource::new(["[[Rome]]"])).await.unwrap();
        assert!(matches!(outcome.enrichment, Some(Enrichment::Degraded { .. })));
        assert!(outcome.record.landmark.is_none());
    }

    #[tokio::test]
    async fn test_source_error_before_first_fragment() {
        let runner = runner(MockEnricher::new());
        let chat_id = ChatId::new();
        let (turn, channels) = runner.start(chat_id.clone());

        let source = ScriptedSource::new(["never"]).failing_after(0, "connection refused");
        let result = turn.run(source).await;
        assert!(matches!(result, Err(TurnError::Source(ref m)) if m.contains("connection refused")));

        let events = timeline(channels).await;
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.is_done()));
        assert_eq!(
            events.last(),
            Some(&TurnEvent::Text(ChannelEvent::Done(None)))
        );
        assert_eq!(saved(&runner, &chat_id), 0);
    }

    #[tokio::test]
    async fn test_source_failure_mid_span_aborts_turn() {
        let enricher = MockEnricher::new();
        let runner = runner(enricher.clone());
        let chat_id = ChatId::new();
        let (turn, channels) = runner.start(chat_id.clone());

        let source = ScriptedSource::new(["Try [[Ber", "lin]] next"]).failing_after(1, "reset");
        let outcome = turn.run(source).await.unwrap();
        let events = timeline(channels).await;

        assert!(outcome.record.aborted);
        assert_eq!(outcome.record.text, "Try ");
        assert!(outcome.record.location.is_none());
        assert_eq!(outcome.metrics.spans_discarded, 1);
        assert_eq!(enricher.describe_calls(), 0);
        assert_eq!(events.iter().filter(|e| e.is_done()).count(), 3);
        assert_eq!(saved(&runner, &chat_id), 1);
    }

    #[tokio::test]
    async fn test_disconnect_after_seal_keeps_enrichment() {
        let runner = runner(paris_enricher());
        let (turn, _channels) = runner.start(ChatId::new());

        let source = ScriptedSource::new(["Visit [[Paris]]", " and", " more"]).disconnect_after(2);
        let outcome = turn.run(source).await.unwrap();

        assert!(outcome.record.aborted);
        assert_eq!(outcome.record.text, "Visit  and");
        assert_eq!(outcome.record.location.as_deref(), Some("Paris"));
        assert!(outcome.record.landmark.is_some());
    }

    #[tokio::test]
    async fn test_unclosed_span_at_completion_is_dropped() {
        let enricher = MockEnricher::new();
        let runner = runner(enricher.clone());
        let (turn, channels) = runner.start(ChatId::new());

        let outcome = turn
            .run(ScriptedSource::new(["Head to [[Vien", "na"]))
            .await
            .unwrap();

        assert!(!outcome.record.aborted);
        assert!(outcome.record.location.is_none());
        assert_eq!(enricher.describe_calls(), 0);
        let span = channels.span_status.collect().await;
        assert_eq!(span.appended, vec![SpanStatus::Pending]);
        assert!(span.finished && span.done.is_none());
    }

    #[tokio::test]
    async fn test_finalize_timeout_degrades_record() {
        let config = StreamConfig {
            enrichment_timeout_secs: 1,
            finalize_timeout_secs: 1,
            ..StreamConfig::default()
        };
        let enricher = MockEnricher::new().with_delay(Duration::from_secs(5));
        let runner = runner_with(enricher, config);
        let (turn, channels) = runner.start(ChatId::new());

        let outcome = turn.run(ScriptedSource::new(["[[Lima]]"])).await.unwrap();
        assert!(outcome.enrichment.unwrap().is_degraded());
        assert!(outcome.record.landmark.is_none());

        let log = channels.enrichment.collect().await;
        assert!(log.done.unwrap().is_degraded());
    }

    #[tokio::test]
    async fn test_empty_span_still_enriched() {
        let enricher = MockEnricher::new();
        let runner = runner(enricher.clone());
        let (turn, _channels) = runner.start(ChatId::new());

        let outcome = turn.run(ScriptedSource::new(["a [[]] b"])).await.unwrap();
        assert_eq!(enricher.describe_calls(), 1);
        assert!(outcome.enrichment.unwrap().is_degraded());
        assert!(outcome.record.location.is_none());
        assert_eq!(outcome.record.text, "a  b");
    }

    #[tokio::test]
    async fn test_runaway_span_is_plain_text() {
        let config = StreamConfig {
            max_span_chars: 10,
            ..StreamConfig::default()
        };
        let enricher = MockEnricher::new();
        let runner = runner_with(enricher.clone(), config);
        let (turn, _channels) = runner.start(ChatId::new());

        let outcome = turn
            .run(ScriptedSource::new(["Note [[this is not a place", " at all]] ok"]))
            .await
            .unwrap();
        assert_eq!(outcome.record.text, "Note this is not a place at all ok");
        assert!(outcome.record.location.is_none());
        assert_eq!(enricher.describe_calls(), 0);
    }

    #[tokio::test]
    async fn test_completion_without_deltas_is_parsed() {
        let runner = runner(paris_enricher());
        let (turn, channels) = runner.start(ChatId::new());

        let source = CompletionOnly(Some("Stay in [[Paris]] tonight".to_string()));
        let outcome = turn.run(source).await.unwrap();

        assert_eq!(outcome.record.text, "Stay in  tonight");
        assert_eq!(outcome.record.location.as_deref(), Some("Paris"));
        let text = channels.text.collect().await;
        assert_eq!(text.done.as_deref(), Some("Stay in  tonight"));
    }

    #[tokio::test]
    async fn test_dropped_turn_closes_channels() {
        let runner = runner(MockEnricher::new());
        let (turn, channels) = runner.start(ChatId::new());
        drop(turn);

        let events = timeline(channels).await;
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.is_done()));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = StreamConfig {
            open_delimiter: "||".to_string(),
            close_delimiter: "||".to_string(),
            ..StreamConfig::default()
        };
        let enricher = MockEnricher::new();
        let result = TurnRunner::new(enricher.clone(), enricher, MemoryStore::new(), config);
        assert!(matches!(result, Err(TurnError::Config(_))));
    }
}
