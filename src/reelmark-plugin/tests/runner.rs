use reelmark_core::{AnalyticsConfig, CollectorCapabilities, RecordingSink};
use reelmark_plugin::{channel, AnalyticsPlugin, HostMessage, PluginHandle, PluginRunner};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn start(config: AnalyticsConfig) -> (PluginHandle, PluginRunner, RecordingSink) {
    let sink = RecordingSink::new();
    let capabilities = CollectorCapabilities {
        universal: true,
        ..CollectorCapabilities::default()
    };
    let plugin = AnalyticsPlugin::new(config, capabilities, Arc::new(sink.clone()));
    let (handle, runner) = channel(plugin, 16);
    (handle, runner, sink)
}

fn event(name: &str, params: Option<serde_json::Value>) -> HostMessage {
    HostMessage::Event {
        event: name.into(),
        params,
    }
}

#[tokio::test(start_paused = true)]
async fn fallback_flushes_after_configured_delay() {
    let (handle, runner, sink) = start(AnalyticsConfig::default());
    let task = tokio::spawn(runner.run());

    handle
        .send(HostMessage::SetPluginId { id: "p-1".into() })
        .await
        .unwrap();
    handle
        .send(event(
            "video_content_metadata_updated",
            Some(json!([{ "title": "Pilot" }])),
        ))
        .await
        .unwrap();
    handle.send(event("video_playing", None)).await.unwrap();

    tokio::time::sleep(Duration::from_secs(9)).await;
    assert!(sink.commands().is_empty());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(sink.event_actions(), ["contentReady", "playbackStarted"]);

    handle.send(HostMessage::Destroy).await.unwrap();
    let (plugin, summary) = task.await.unwrap();
    assert!(plugin.is_destroyed());
    assert_eq!(plugin.plugin_id(), Some("p-1"));
    assert_eq!(summary.messages, 4);
    assert_eq!(summary.fallback_flushes, 1);
}

#[tokio::test(start_paused = true)]
async fn stream_metadata_before_deadline_cancels_fallback() {
    let (handle, runner, sink) = start(AnalyticsConfig::default());
    let task = tokio::spawn(runner.run());

    handle
        .send(event(
            "video_content_metadata_updated",
            Some(json!([{ "title": "Pilot" }])),
        ))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;
    handle
        .send(event("video_stream_metadata_updated", Some(json!([{}]))))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(30)).await;

    drop(handle);
    let (plugin, summary) = task.await.unwrap();
    assert_eq!(sink.event_actions(), ["contentReady"]);
    assert_eq!(summary.fallback_flushes, 0);
    assert!(plugin.is_destroyed(), "closing the input destroys the plugin");
}

#[tokio::test(start_paused = true)]
async fn rearming_restarts_the_deadline() {
    let config = AnalyticsConfig {
        fallback_flush_secs: 4,
        ..AnalyticsConfig::default()
    };
    let (handle, runner, sink) = start(config);
    let task = tokio::spawn(runner.run());

    let ready = || {
        event(
            "video_content_metadata_updated",
            Some(json!([{ "title": "Pilot" }])),
        )
    };
    handle.send(ready()).await.unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;
    handle.send(event("video_playing", None)).await.unwrap();
    handle.send(ready()).await.unwrap();

    // The first deadline (t=4) has passed but was replaced at t=3.
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(sink.commands().is_empty());

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(
        sink.event_actions(),
        ["contentReady", "playbackStarted", "contentReady"]
    );

    handle.send(HostMessage::Destroy).await.unwrap();
    let (_, summary) = task.await.unwrap();
    assert_eq!(summary.fallback_flushes, 1);
}

#[tokio::test]
async fn session_end_reports_abandonment_through_the_runner() {
    let (handle, runner, sink) = start(AnalyticsConfig::default());
    let task = tokio::spawn(runner.run());

    for message in [
        event("video_stream_metadata_updated", Some(json!([{}]))),
        event("video_playing", None),
        HostMessage::SessionEnd,
        HostMessage::Destroy,
    ] {
        handle.send(message).await.unwrap();
    }

    let (_, summary) = task.await.unwrap();
    assert_eq!(summary.messages, 4);
    assert_eq!(sink.event_actions(), ["playbackStarted", "contentAbandoned"]);
}

#[tokio::test]
async fn sending_after_destroy_fails() {
    let (handle, runner, _) = start(AnalyticsConfig::default());
    let task = tokio::spawn(runner.run());
    handle.send(HostMessage::Destroy).await.unwrap();
    task.await.unwrap();

    assert!(handle.send(HostMessage::SessionEnd).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn closed_input_waits_for_armed_fallback_when_draining() {
    let (handle, runner, sink) = start(AnalyticsConfig::default());
    let task = tokio::spawn(runner.drain_fallback_on_close(true).run());

    handle
        .send(event(
            "video_content_metadata_updated",
            Some(json!([{ "title": "Pilot" }])),
        ))
        .await
        .unwrap();
    handle.send(event("video_playing", None)).await.unwrap();
    drop(handle);

    let started = tokio::time::Instant::now();
    let (plugin, summary) = task.await.unwrap();

    assert!(started.elapsed() >= Duration::from_secs(10));
    assert_eq!(sink.event_actions(), ["contentReady", "playbackStarted"]);
    assert_eq!(summary.fallback_flushes, 1);
    assert!(plugin.is_destroyed());
    assert_eq!(plugin.classifier().gate().buffered_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn closed_input_drops_armed_fallback_by_default() {
    let (handle, runner, sink) = start(AnalyticsConfig::default());
    let task = tokio::spawn(runner.run());

    handle
        .send(event(
            "video_content_metadata_updated",
            Some(json!([{ "title": "Pilot" }])),
        ))
        .await
        .unwrap();
    drop(handle);

    let (plugin, summary) = task.await.unwrap();
    assert!(sink.commands().is_empty());
    assert_eq!(summary.fallback_flushes, 0);
    assert_eq!(plugin.classifier().gate().buffered_len(), 1);
}
