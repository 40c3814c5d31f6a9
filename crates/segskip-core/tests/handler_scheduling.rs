mod common;

use common::{assert_close, seg, Harness};
use segskip_core::config::ConfigValue;
use segskip_core::handler::{Lifecycle, TOAST_TITLE};
use segskip_core::segments::Category;
use segskip_core::surface::MediaEvent;

#[test]
fn test_skips_sponsor_but_not_manual_intro() {
    let mut h = Harness::new();
    let mut handler = h.active_handler(vec![
        seg(Category::Sponsor, 10.0, 20.0),
        seg(Category::Intro, 25.0, 30.0),
    ]);
    assert!(handler.is_surface_attached());
    assert!(handler.has_pending_skip());

    h.run_timers(&mut handler, 12.0);
    assert_eq!(h.surface.seeks.len(), 1);
    assert_close(h.surface.seeks[0], 20.1);
    assert_eq!(
        h.notifier.toasts,
        vec![(TOAST_TITLE.to_string(), "Skipping sponsored segment".to_string())]
    );

    // intro is manual-only by default: play straight through it
    h.play(&mut handler, 10.0);
    assert_eq!(h.surface.seeks.len(), 1);
    assert!(h.surface.time > 30.0);
    assert!(!handler.has_pending_skip());
}

#[test]
fn test_adjacent_segments_chain_without_gap() {
    let mut h = Harness::new();
    let mut handler = h.active_handler(vec![
        seg(Category::Sponsor, 10.0, 20.0),
        seg(Category::SelfPromo, 20.0, 30.0),
    ]);

    h.run_timers(&mut handler, 10.5);
    assert_eq!(h.surface.seeks.len(), 2);
    assert_close(h.surface.seeks[0], 20.1);
    assert_close(h.surface.seeks[1], 30.1);
    assert_eq!(h.notifier.toasts.len(), 2);
    assert_eq!(h.notifier.toasts[1].1, "Skipping self-promotion");
    assert!(!handler.has_pending_skip());
    assert_eq!(h.timers.armed_count(), 0);
}

#[test]
fn test_starting_inside_segment_skips_immediately() {
    let mut h = Harness::new();
    h.surface.time = 12.0;
    let handler = h.active_handler(vec![seg(Category::Sponsor, 10.0, 20.0)]);

    assert_eq!(h.surface.seeks.len(), 1);
    assert_close(h.surface.time, 20.1);
    assert!(!handler.has_pending_skip());
}

#[test]
fn test_cursor_does_not_rewind_on_backward_seek() {
    let mut h = Harness::new();
    let mut handler = h.active_handler(vec![
        seg(Category::Sponsor, 10.0, 20.0),
        seg(Category::Sponsor, 40.0, 50.0),
    ]);

    h.run_timers(&mut handler, 10.0);
    h.play(&mut handler, 10.0);
    assert_eq!(handler.cursor(), 1);

    h.surface.time = 5.0;
    handler.on_media_event(MediaEvent::TimeUpdate, &mut h.env());
    assert_eq!(handler.cursor(), 1);

    // the earlier segment is behind the cursor and stays unskipped
    h.run_timers(&mut handler, 10.0);
    assert_eq!(h.surface.seeks.len(), 1);
    assert!(handler.has_pending_skip());
}

#[test]
fn test_pause_cancels_pending_skip() {
    let mut h = Harness::new();
    let mut handler = h.active_handler(vec![seg(Category::Sponsor, 10.0, 20.0)]);
    assert!(handler.has_pending_skip());

    h.surface.paused = true;
    handler.on_media_event(MediaEvent::Pause, &mut h.env());
    assert!(!handler.has_pending_skip());
    assert_eq!(h.timers.armed_count(), 0);

    h.run_timers(&mut handler, 30.0);
    assert!(h.surface.seeks.is_empty());

    h.surface.paused = false;
    handler.on_media_event(MediaEvent::Play, &mut h.env());
    assert!(handler.has_pending_skip());
    h.run_timers(&mut handler, 10.0);
    assert_eq!(h.surface.seeks.len(), 1);
}

#[test]
fn test_timer_firing_while_paused_does_not_seek() {
    let mut h = Harness::new();
    let mut handler = h.active_handler(vec![seg(Category::Sponsor, 10.0, 20.0)]);

    // paused without the host reporting it yet
    h.surface.paused = true;
    h.run_timers(&mut handler, 15.0);
    assert!(h.surface.seeks.is_empty());
    assert!(h.notifier.toasts.is_empty());
}

#[test]
fn test_clamped_seek_stops_chaining() {
    let mut h = Harness::new();
    h.surface.clamp_to = Some(15.0);
    let mut handler = h.active_handler(vec![seg(Category::Sponsor, 10.0, 20.0)]);

    h.run_timers(&mut handler, 10.0);
    assert_eq!(h.surface.seeks.len(), 1);
    assert_eq!(h.notifier.toasts.len(), 1);
    assert!(!handler.has_pending_skip());
}

#[test]
fn test_destroy_is_idempotent_and_releases_everything() {
    let mut h = Harness::new();
    let mut handler = h.active_handler(vec![seg(Category::Sponsor, 10.0, 20.0)]);
    assert!(h.surface.subscribed);
    assert!(h.host.shown.is_some());

    handler.destroy(&mut h.env());
    let status = handler.status();
    handler.destroy(&mut h.env());

    assert_eq!(handler.status(), status);
    assert_eq!(handler.lifecycle(), Lifecycle::Destroyed);
    assert_eq!(h.timers.armed_count(), 0);
    assert!(!h.surface.subscribed);
    assert!(h.host.shown.is_none());
    assert_eq!(h.host.removes, 1);
}

#[test]
fn test_destroyed_handler_ignores_events() {
    let mut h = Harness::new();
    let mut handler = h.active_handler(vec![seg(Category::Sponsor, 10.0, 20.0)]);
    handler.destroy(&mut h.env());

    h.surface.time = 15.0;
    handler.schedule_skip(&mut h.env());
    handler.on_media_event(MediaEvent::TimeUpdate, &mut h.env());
    assert!(handler.skip_manual(&mut h.env()).is_none());

    assert!(h.surface.seeks.is_empty());
    assert_eq!(h.timers.armed_count(), 0);
}

#[test]
fn test_empty_segment_set_stays_inert() {
    let mut h = Harness::new();
    let handler = h.active_handler(Vec::new());

    assert_eq!(handler.lifecycle(), Lifecycle::Active);
    assert!(!handler.is_surface_attached());
    assert!(!h.surface.subscribed);
    assert_eq!(h.timers.armed_count(), 0);
    assert_eq!(h.host.renders, 0);
}

#[test]
fn test_probes_until_surface_appears() {
    let mut h = Harness::new();
    h.surface.present = false;
    let mut handler = h.active_handler(vec![seg(Category::Sponsor, 10.0, 20.0)]);
    assert!(!handler.is_surface_attached());
    assert_eq!(h.timers.armed_count(), 1);

    h.run_timers(&mut handler, 0.35);
    assert!(!handler.is_surface_attached());
    assert_eq!(h.timers.armed_count(), 1);

    h.surface.present = true;
    h.run_timers(&mut handler, 0.1);
    assert!(handler.is_surface_attached());
    assert!(h.surface.subscribed);
    assert!(handler.has_pending_skip());
    assert!(h.host.shown.is_some());
}

#[test]
fn test_manual_skip_jumps_past_current_segment() {
    let mut h = Harness::new();
    h.surface.time = 2.0;
    let mut handler = h.active_handler(vec![seg(Category::Intro, 0.0, 5.0)]);
    assert!(h.surface.seeks.is_empty());

    let skipped = handler.skip_manual(&mut h.env());
    assert_eq!(skipped.map(|s| s.category), Some(Category::Intro));
    assert_close(h.surface.time, 5.1);
    assert_eq!(h.notifier.toasts[0].1, "Skipping intro");

    assert!(handler.skip_manual(&mut h.env()).is_none());
}

#[test]
fn test_policy_change_reschedules() {
    let mut h = Harness::new();
    let mut handler = h.active_handler(vec![seg(Category::Intro, 10.0, 20.0)]);
    assert!(!handler.has_pending_skip());

    h.config
        .write("manual_skips", ConfigValue::Categories(Vec::new()))
        .unwrap();
    handler.on_policy_changed(&mut h.env());
    assert!(handler.has_pending_skip());

    h.config
        .write("category.intro", ConfigValue::Bool(false))
        .unwrap();
    handler.on_policy_changed(&mut h.env());
    assert!(!handler.has_pending_skip());
}

#[test]
fn test_overlay_waits_for_duration() {
    let mut h = Harness::new();
    h.surface.duration = None;
    let mut handler = h.active_handler(vec![
        seg(Category::Sponsor, 10.0, 20.0),
        seg(Category::Outro, 90.0, 100.0),
    ]);
    assert!(h.host.shown.is_none());

    h.surface.duration = Some(100.0);
    handler.on_media_event(MediaEvent::DurationChange, &mut h.env());
    let strip = h.host.shown.clone().unwrap();
    assert_eq!(strip.markers.len(), 2);
    assert_close(strip.markers[0].offset, 0.1);
    assert_eq!(handler.status().overlay_markers, 2);

    // a second duration change does not rebuild
    handler.on_media_event(MediaEvent::DurationChange, &mut h.env());
    assert_eq!(h.host.renders, 1);
}

#[test]
fn test_overlay_follows_host_focus_and_removal() {
    let mut h = Harness::new();
    let mut handler = h.active_handler(vec![seg(Category::Sponsor, 10.0, 20.0)]);
    assert_eq!(h.host.renders, 1);

    h.host.focused = false;
    handler.on_overlay_host_changed(&mut h.env());
    assert_eq!(h.host.renders, 2);
    assert_eq!(h.host.shown.as_ref().map(|s| s.focused), Some(false));

    // host rebuilt its bar and dropped our strip
    h.host.shown = None;
    handler.on_overlay_host_changed(&mut h.env());
    assert_eq!(h.host.renders, 3);

    handler.on_overlay_host_changed(&mut h.env());
    assert_eq!(h.host.renders, 3);
}

#[test]
fn test_segment_beyond_timer_range_is_not_armed() {
    let mut h = Harness::new();
    let mut handler = h.active_handler(vec![seg(Category::Sponsor, 1e20, 2e20)]);
    assert_eq!(handler.lifecycle(), Lifecycle::Active);
    assert!(!handler.has_pending_skip());
    assert_eq!(h.timers.armed_count(), 0);

    h.play(&mut handler, 2.0);
    assert!(h.surface.seeks.is_empty());
    assert!(h.notifier.toasts.is_empty());
}
