//! End-to-end scenarios for the board against its public API.
//!
//! Run with: RUST_LOG=debug cargo test --test integration

use std::time::{Duration, Instant};

use serde_json::Value;

use classboard::poll_sync::{end_poll, go_live};
use classboard::store::{CURRENT_KEY, NAMED_KEY};
use classboard::widget::{PollState, TextState};
use classboard::{
    Board, BoardSettings, ChannelError, Config, FileStorage, LayoutError, MemoryPollChannel,
    MemoryStorage, PointerEvent, PointerId, PointerOutcome, PollSync, Rect, Storage, Viewport,
    WidgetKind, WidgetPayload,
};

const MOUSE: PointerId = PointerId(1);
const TOUCH: PointerId = PointerId(2);

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn settings() -> BoardSettings {
    BoardSettings {
        viewport: Viewport::new(1280.0, 800.0, 80.0),
        ..BoardSettings::default()
    }
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// Move the auto-save deadline past anything already pending
fn settle<S: Storage>(board: &mut Board<S>) {
    board.tick(Instant::now() + ms(1001));
}

fn stored_json<S: Storage>(storage: &S, key: &str) -> Value {
    let raw = storage.get_item(key).unwrap().expect("key present");
    serde_json::from_str(&raw).unwrap()
}

#[test]
fn test_clock_drag_then_resize() {
    init_logging();
    let mut board = Board::mount(settings(), MemoryStorage::new());
    let clock = board.add_widget(WidgetKind::Clock).unwrap();
    let now = Instant::now();

    // Drag by the body
    let started = board.handle_pointer(PointerEvent::down(MOUSE, 400.0, 120.0), now);
    assert!(matches!(started, PointerOutcome::Started { .. }));
    board.handle_pointer(PointerEvent::moved(MOUSE, 450.0, 90.0), now);
    board.handle_pointer(PointerEvent::up(MOUSE, 450.0, 90.0), now);
    assert_eq!(board.rect_of(clock), Some(Rect::new(370.0, 50.0, 200.0, 120.0)));

    // Resize from the corner handle
    board.handle_pointer(PointerEvent::down(MOUSE, 565.0, 165.0), now);
    board.handle_pointer(PointerEvent::moved(MOUSE, 605.0, 185.0), now);
    board.handle_pointer(PointerEvent::up(MOUSE, 605.0, 185.0), now);
    assert_eq!(board.rect_of(clock), Some(Rect::new(370.0, 50.0, 240.0, 140.0)));
}

#[test]
fn test_drag_is_clamped_to_usable_area() {
    init_logging();
    let mut board = Board::mount(settings(), MemoryStorage::new());
    let timer = board.add_widget(WidgetKind::Timer).unwrap();
    let now = Instant::now();

    board.handle_pointer(PointerEvent::down(MOUSE, 100.0, 300.0), now);
    board.handle_pointer(PointerEvent::moved(MOUSE, 5000.0, 5000.0), now);
    let rect = board.rect_of(timer).unwrap();
    assert_eq!(rect.x, 1280.0 - rect.width);
    assert_eq!(rect.y, 720.0 - rect.height);

    // Coming back moves by the full delta: no drift from the clamped part
    board.handle_pointer(PointerEvent::moved(MOUSE, 4900.0, 4950.0), now);
    let back = board.rect_of(timer).unwrap();
    assert_eq!(back.x, rect.x - 100.0);
    assert_eq!(back.y, rect.y - 50.0);
}

#[test]
fn test_second_pointer_does_not_steal_gesture() {
    init_logging();
    let mut board = Board::mount(settings(), MemoryStorage::new());
    let text = board.add_widget(WidgetKind::Text).unwrap();
    let now = Instant::now();

    board.handle_pointer(PointerEvent::down(MOUSE, 100.0, 100.0), now);
    let touch = board.handle_pointer(PointerEvent::down(TOUCH, 120.0, 120.0), now);
    assert_eq!(touch, PointerOutcome::Ignored);
    board.handle_pointer(PointerEvent::moved(TOUCH, 300.0, 300.0), now);
    board.handle_pointer(PointerEvent::up(TOUCH, 300.0, 300.0), now);
    assert_eq!(board.rect_of(text), Some(Rect::new(40.0, 40.0, 350.0, 300.0)));

    board.handle_pointer(PointerEvent::moved(MOUSE, 110.0, 100.0), now);
    assert_eq!(board.rect_of(text).unwrap().x, 50.0);
}

#[test]
fn test_morning_screen_round_trip() {
    init_logging();
    let mut board = Board::mount(settings(), MemoryStorage::new());
    let clock = board.add_widget(WidgetKind::Clock).unwrap();
    let timer = board.add_widget(WidgetKind::Timer).unwrap();
    board.set_background_color("#0b3d91");
    board.set_widget_transparency(70.0);
    let now = Instant::now();
    board.handle_pointer(PointerEvent::down(MOUSE, 400.0, 120.0), now);
    board.handle_pointer(PointerEvent::moved(MOUSE, 420.0, 140.0), now);
    board.handle_pointer(PointerEvent::up(MOUSE, 420.0, 140.0), now);
    let saved = board.collect_layout();

    board.save_named("Morning").unwrap();
    board.reset().unwrap();
    assert!(board.is_empty());

    board.load_named("Morning").unwrap();
    assert_eq!(board.collect_layout(), saved);
    assert_eq!(board.widget_ids(), vec![clock, timer]);
    assert_eq!(board.rect_of(clock), Some(Rect::new(340.0, 100.0, 200.0, 120.0)));
    assert_eq!(board.display_options().widget_transparency, 70);
    assert_eq!(board.list_named().into_iter().collect::<Vec<_>>(), vec!["Morning"]);

    // Loading also becomes the current layout
    let storage = board.unmount();
    let remounted = Board::mount(settings(), storage);
    assert_eq!(remounted.collect_layout(), saved);
}

#[test]
fn test_named_screen_errors_leave_board_alone() {
    init_logging();
    let mut board = Board::mount(settings(), MemoryStorage::new());
    let dice = board.add_widget(WidgetKind::Dice).unwrap();

    match board.load_named("Afternoon") {
        Err(LayoutError::NotFound(name)) => assert_eq!(name, "Afternoon"),
        other => panic!("Expected NotFound, got {:?}", other),
    }
    assert!(matches!(board.save_named(""), Err(LayoutError::InvalidName)));
    assert_eq!(board.widget_ids(), vec![dice]);

    board.delete_named("Afternoon").unwrap();
    assert!(board.list_named().is_empty());
}

#[test]
fn test_autosave_coalesces_a_burst() {
    init_logging();
    let mut board = Board::mount(settings(), MemoryStorage::new());
    let stoplight = board.add_widget(WidgetKind::Stoplight).unwrap();
    settle(&mut board);
    let writes = board.storage().write_count();

    let start = Instant::now();
    board.handle_pointer(PointerEvent::down(MOUSE, 150.0, 150.0), start);
    for i in 1..=30u64 {
        let now = start + ms(i * 20);
        board.handle_pointer(PointerEvent::moved(MOUSE, 150.0 + i as f64 * 5.0, 150.0), now);
        board.tick(now);
    }
    let last_move = start + ms(600);
    board.handle_pointer(PointerEvent::up(MOUSE, 300.0, 150.0), last_move);

    assert!(!board.tick(last_move + ms(999)));
    assert_eq!(board.storage().write_count(), writes);
    assert!(board.tick(last_move + ms(1000)));
    assert_eq!(board.storage().write_count(), writes + 1);
    assert!(!board.tick(last_move + ms(5000)));

    let blob = stored_json(board.storage(), CURRENT_KEY);
    assert_eq!(blob["widgets"][0]["id"], stoplight.0);
    assert_eq!(blob["widgets"][0]["position"]["x"], 230.0);
}

#[test]
fn test_file_storage_survives_remount() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::open(dir.path()).unwrap();
    let mut board = Board::mount(settings(), storage);

    let text = board.add_widget(WidgetKind::Text).unwrap();
    board
        .update_payload(text, WidgetPayload::Text(TextState { content: "<b>Quiet reading</b>".into() }))
        .unwrap();
    board.rename_widget(text, "Now").unwrap();
    board.set_hide_titles(true);
    settle(&mut board);
    board.save_named("Reading").unwrap();
    let before = board.collect_layout();
    drop(board.unmount());

    assert!(dir.path().join(format!("{}.json", CURRENT_KEY)).exists());
    assert!(dir.path().join(format!("{}.json", NAMED_KEY)).exists());

    let board = Board::mount(settings(), FileStorage::open(dir.path()).unwrap());
    assert_eq!(board.collect_layout(), before);
    assert_eq!(board.widget(text).unwrap().title, "Now");
    assert!(board.list_named().contains("Reading"));
}

#[test]
fn test_corrupt_layout_starts_empty() {
    init_logging();
    let mut storage = MemoryStorage::new();
    storage.set_item(CURRENT_KEY, "{ not json").unwrap();
    storage.set_item(NAMED_KEY, "[1, 2, 3]").unwrap();

    let board = Board::mount(settings(), storage);
    assert!(board.is_empty());
    assert!(board.list_named().is_empty());
    assert_eq!(board.display_options().background_color, "#800cb6ff");
}

#[test]
fn test_legacy_layout_is_upgraded_on_mount() {
    init_logging();
    let legacy = r#"{
        "widgets": [
            {"id": 1700000000000, "type": "clock", "position": {"x": 10, "y": 20}},
            {"id": 1700000000001, "type": "calendar", "position": {"x": 0, "y": 0}},
            {"id": 1700000000002, "type": "image", "title": "Map",
             "position": {"x": 5000, "y": 5000, "width": 300, "height": 250},
             "widgetData": {"imageUrl": "blob:http://localhost/abc"}}
        ],
        "bgUrl": "blob:http://localhost/def",
        "widgetTransparency": 400
    }"#;
    let mut storage = MemoryStorage::new();
    storage.set_item(CURRENT_KEY, legacy).unwrap();

    let mut board = Board::mount(settings(), storage);
    let ids: Vec<u64> = board.widget_ids().into_iter().map(|id| id.0).collect();
    assert_eq!(ids, vec![1700000000000, 1700000000002]);

    let clock = board.widget(board.widget_ids()[0]).unwrap();
    assert_eq!(clock.title, "Clock");
    assert_eq!(clock.rect, Rect::new(10.0, 20.0, 200.0, 120.0));

    let image = board.widget(board.widget_ids()[1]).unwrap();
    assert_eq!(image.rect, Rect::new(980.0, 470.0, 300.0, 250.0));
    assert_eq!(image.payload, WidgetPayload::default_for(WidgetKind::Image));

    let options = board.display_options();
    assert_eq!(options.background_image, None);
    assert_eq!(options.widget_transparency, 100);

    // New ids never collide with restored ones
    let added = board.add_widget(WidgetKind::Dice).unwrap();
    assert!(added.0 > 1700000000002);
}

#[test]
fn test_config_drives_board() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "[board]\nviewport_width = 800\nviewport_height = 600\nbottom_bar_height = 100\n\n\
         [persistence]\nautosave_quiet_ms = 200\n",
    )
    .unwrap();
    let settings = Config::load_from_path(path).settings();

    let mut board = Board::mount(settings, MemoryStorage::new());
    assert_eq!(board.viewport(), Viewport::new(800.0, 600.0, 100.0));
    let conversion = board.add_widget(WidgetKind::Conversion).unwrap();
    let rect = board.rect_of(conversion).unwrap();
    assert!(rect.right() <= 800.0);
    assert!(rect.bottom() <= 500.0);

    assert!(board.tick(Instant::now() + ms(201)));
}

#[test]
fn test_live_poll_voting() {
    init_logging();
    let channel = MemoryPollChannel::new();
    let mut board = Board::mount(settings(), MemoryStorage::new());
    let poll = board.add_widget(WidgetKind::Poll).unwrap();

    let state = PollState {
        poll_id: Some("room-12".to_string()),
        title: "Favourite season?".to_string(),
        options: vec!["Spring".into(), "Summer".into(), "Autumn".into()],
    };
    board.update_payload(poll, WidgetPayload::Poll(state.clone())).unwrap();
    go_live(&channel, "room-12", &state, 1_700_000_000_000).unwrap();

    let mut alice_device = MemoryStorage::new();
    let mut bob_device = MemoryStorage::new();
    let mut alice = PollSync::connect(&channel, &mut alice_device, "room-12").unwrap();
    let mut bob = PollSync::connect(&channel, &mut bob_device, "room-12").unwrap();
    assert_ne!(alice.voter_id(), bob.voter_id());

    alice.select("Autumn");
    alice.submit(&channel, &mut alice_device).unwrap();
    bob.select("Autumn");
    bob.submit(&channel, &mut bob_device).unwrap();

    // Both devices see both votes
    assert_eq!(alice.data().unwrap().votes.get("Autumn"), Some(&2));
    assert_eq!(bob.data().unwrap().voters.len(), 2);
    assert_eq!(alice.submit(&channel, &mut alice_device), Err(ChannelError::AlreadyVoted));

    end_poll(&channel, "room-12").unwrap();
    let mut late_device = MemoryStorage::new();
    let mut late = PollSync::connect(&channel, &mut late_device, "room-12").unwrap();
    late.select("Spring");
    assert_eq!(late.submit(&channel, &mut late_device), Err(ChannelError::NotLive));
}

#[test]
fn test_poll_outage_and_unsubscribe() {
    init_logging();
    let channel = MemoryPollChannel::new();
    go_live(&channel, "p", &PollState::default(), 0).unwrap();
    let mut device = MemoryStorage::new();
    let mut sync = PollSync::connect(&channel, &mut device, "p").unwrap();
    assert_eq!(channel.subscriber_count("p"), 1);

    channel.set_available(false);
    sync.select("A");
    assert_eq!(sync.submit(&channel, &mut device), Err(ChannelError::Unavailable));
    channel.set_available(true);
    assert!(sync.submit(&channel, &mut device).is_ok());

    drop(sync);
    assert_eq!(channel.subscriber_count("p"), 0);
}
