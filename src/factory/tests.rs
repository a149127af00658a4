use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use test_log::test;

use super::*;
use crate::model::{CapabilityOverride, HostHandle, Orientation};

#[derive(Default)]
struct RecordingHost {
    calls: Rc<RefCell<Vec<String>>>,
    next: u64,
}

impl WindowHost for RecordingHost {
    fn create_host_window(&mut self, _window: WindowId, _entry: &DockWindow) -> HostHandle {
        self.next += 1;
        self.calls.borrow_mut().push("create".into());
        HostHandle(self.next)
    }

    fn present(&mut self, _handle: HostHandle, is_dialog: bool) {
        self.calls.borrow_mut().push(format!("present dialog={is_dialog}"));
    }

    fn set_position(&mut self, _handle: HostHandle, x: f64, y: f64) {
        self.calls.borrow_mut().push(format!("position {x},{y}"));
    }

    fn set_size(&mut self, _handle: HostHandle, width: f64, height: f64) {
        self.calls.borrow_mut().push(format!("size {width}x{height}"));
    }

    fn set_title(&mut self, _handle: HostHandle, title: &str) {
        self.calls.borrow_mut().push(format!("title {title}"));
    }

    fn close(&mut self, _handle: HostHandle) { self.calls.borrow_mut().push("close".into()); }
}

/// Refuses to close the dockable with the given id, and every window if asked to.
struct Veto {
    dockable: Option<&'static str>,
    windows: bool,
}

impl LifecycleObserver for Veto {
    fn dockable_closing(&mut self, model: &DockModel, dockable: NodeId) -> bool {
        model.get(dockable).map(|d| d.id.as_str()) != self.dockable
    }

    fn window_closing(&mut self, _model: &DockModel, _window: WindowId) -> bool { !self.windows }
}

/// ```text
/// root
/// └── main (horizontal)
///     ├── left (tool dock, 0.25)
///     │   └── explorer
///     ├── splitter
///     └── docs (0.75)
///         ├── a
///         ├── b
///         └── c
/// ```
struct Fixture {
    factory: Factory,
    root: NodeId,
    main: NodeId,
    left: NodeId,
    explorer: NodeId,
    docs: NodeId,
    a: NodeId,
    b: NodeId,
    c: NodeId,
    events: Rc<RefCell<Vec<DockEvent>>>,
    host: Rc<RefCell<Vec<String>>>,
}

fn fixture() -> Fixture {
    let mut model = DockModel::new("root");
    let root = model.root();
    let main = model.insert(root, Dockable::proportional("main", Orientation::Horizontal));
    let left = model.insert(main, Dockable::tool_dock("left", Edge::Left).with_proportion(0.25));
    let explorer = model.insert(left, Dockable::tool("explorer", "Explorer"));
    model.insert(main, Dockable::splitter("main-split"));
    let docs = model.insert(main, Dockable::document_dock("docs").with_proportion(0.75));
    let a = model.insert(docs, Dockable::document("a", "A"));
    let b = model.insert(docs, Dockable::document("b", "B"));
    let c = model.insert(docs, Dockable::document("c", "C"));

    let host = RecordingHost::default();
    let calls = host.calls.clone();
    let mut factory = Factory::new(model, Config::default()).with_host(host);
    let events = Rc::new(RefCell::new(vec![]));
    {
        let events = events.clone();
        factory.events().subscribe(move |_, e| events.borrow_mut().push(e.clone()));
    }
    Fixture {
        factory,
        root,
        main,
        left,
        explorer,
        docs,
        a,
        b,
        c,
        events,
        host: calls,
    }
}

impl Fixture {
    fn model(&self) -> &DockModel { self.factory.model() }

    fn get(&self, node: NodeId) -> &Dockable { self.model().get(node).unwrap() }

    fn members(&self, dock: NodeId) -> Vec<NodeId> { self.model().content_dockables(dock).collect() }

    fn take_events(&self) -> Vec<DockEvent> { self.events.borrow_mut().drain(..).collect() }

    fn event_names(&self) -> Vec<&'static str> {
        self.take_events().iter().map(|e| e.name()).collect()
    }

    fn assert_consistent(&self) {
        assert_eq!(self.model().violations(), Vec::<String>::new(), "\n{}", self.draw());
    }

    fn draw(&self) -> String { self.model().draw_tree(self.root) }

    fn splitter_of(&self, dock: NodeId) -> NodeId {
        self.model().visible_dockables(dock).find(|&n| self.model().is_splitter(n)).unwrap()
    }
}

fn close_to(actual: f64, expected: f64) -> bool { (actual - expected).abs() < 1e-9 }

mod membership {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    #[test]
    fn add_creates_and_rebalances_the_owner() {
        let mut f = fixture();
        let more = f.factory.add(f.main, Dockable::document_dock("more"), None).unwrap();
        assert_eq!(
            f.take_events(),
            [DockEvent::DockableAdded { dockable: more, owner: f.main, index: 4 }]
        );
        // Still empty, so it takes no share yet.
        assert!(f.model().is_collapsed(more));
        f.assert_consistent();

        let doc = f.factory.add(more, Dockable::document("d", "D"), None).unwrap();
        assert_eq!(f.get(more).active_dockable, Some(doc));
        assert!(close_to(f.get(f.left).proportion, 0.1875));
        assert!(close_to(f.get(f.docs).proportion, 0.5625));
        assert!(close_to(f.get(more).proportion, 0.25));
        f.assert_consistent();
    }

    #[test]
    fn add_rejects_bad_targets() {
        let mut f = fixture();
        let err = f.factory.add_dockable(f.a, f.b, None).unwrap_err();
        assert_eq!(err, DockError::InvariantViolation(Violation::NotAContainer(f.a)));
        let err = f.factory.add_dockable(f.docs, f.a, None).unwrap_err();
        assert_eq!(err, DockError::from(Violation::AlreadyMember(f.a, f.docs)));
        let err = f.factory.add_dockable(f.left, f.a, None).unwrap_err();
        assert_eq!(err, DockError::from(Violation::AlreadyOwned(f.a)));

        let outer = f.factory.create_dockable(Dockable::document_dock("outer"));
        let inner = f.factory.add(outer, Dockable::document_dock("inner"), None).unwrap();
        f.take_events();
        let err = f.factory.add_dockable(inner, outer, None).unwrap_err();
        assert_eq!(err, DockError::from(Violation::IntoDescendant(outer, inner)));
        assert_eq!(err.category(), ErrorCategory::InvariantViolation);
        assert!(f.take_events().is_empty());
    }

    #[test]
    fn remove_activates_a_neighbour() {
        let mut f = fixture();
        f.factory.remove_dockable(f.a).unwrap();
        assert_eq!(
            f.take_events(),
            [DockEvent::DockableRemoved {
                dockable: f.a,
                id: "a".into(),
                owner: Some(f.docs),
                index: Some(0),
            }]
        );
        assert!(!f.model().contains(f.a));
        assert_eq!(f.get(f.docs).active_dockable, Some(f.b));
        assert!(f.get(f.b).is_active);
    }

    #[test]
    fn removing_the_last_member_prunes_the_dock() {
        let mut f = fixture();
        f.factory.remove_dockable(f.explorer).unwrap();
        assert!(!f.model().contains(f.left));
        assert_eq!(f.model().visible_dockables(f.main).collect::<Vec<_>>(), [f.docs]);
        assert!(close_to(f.get(f.docs).proportion, 1.0));
        assert_eq!(f.get(f.main).active_dockable, Some(f.docs));
        assert_eq!(f.event_names(), ["DockableRemoved"]);
        f.assert_consistent();
    }

    #[test]
    fn last_member_guard() {
        let mut model = DockModel::new("root");
        let docs = model.insert(
            model.root(),
            Dockable::document_dock("docs").with_can_close_last_dockable(false),
        );
        let only = model.insert(docs, Dockable::document("only", "Only"));
        let mut factory = Factory::new(model, Config::default());
        let count = Rc::new(RefCell::new(0));
        {
            let count = count.clone();
            factory.events().subscribe(move |_, _| *count.borrow_mut() += 1);
        }

        let err = factory.remove_dockable(only).unwrap_err();
        assert_eq!(err, DockError::from(Violation::LastDockable(docs)));
        assert_eq!(err.category(), ErrorCategory::InvariantViolation);
        assert_eq!(factory.close_dockable(only).unwrap_err(), err);
        assert!(factory.model().contains(only));
        assert_eq!(*count.borrow(), 0);
    }

    #[test]
    fn root_can_forbid_closing_its_last_document() {
        let mut model = DockModel::with_root(Dockable::root("root").with_can_close_last_dockable(false));
        let root = model.root();
        let doc = model.insert(root, Dockable::document("doc", "Doc"));
        let mut factory = Factory::new(model, Config::default());
        assert_eq!(
            factory.close_dockable(doc).unwrap_err(),
            DockError::from(Violation::LastDockable(root))
        );
        assert_eq!(factory.model().visible_dockables(root).collect::<Vec<_>>(), vec![doc]);
    }

    #[test]
    fn config_can_forbid_closing_the_last_member_of_new_docks() {
        let mut config = Config::default();
        config.docks.can_close_last_dockable = false;
        let mut factory = Factory::new(DockModel::new("root"), config);
        let root = factory.model().root();
        let docs = factory.add(root, Dockable::document_dock("docs"), None).unwrap();
        let doc = factory.add(docs, Dockable::document("doc", "Doc"), None).unwrap();
        assert_eq!(factory.remove_dockable(doc).unwrap_err(), DockError::from(Violation::LastDockable(docs)));
    }
}

mod moving {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    #[test]
    fn moving_into_an_auto_hidden_tool_dock_expands_it() {
        let mut f = fixture();
        if let Some(d) = f.factory.model.get_mut(f.left) {
            d.kind = DockKind::ToolDock { alignment: Edge::Left, auto_hide: true, is_expanded: false };
        }
        f.factory.move_dockable(f.docs, f.left, f.a, None).unwrap();
        assert_eq!(
            f.get(f.left).kind,
            DockKind::ToolDock { alignment: Edge::Left, auto_hide: true, is_expanded: true }
        );
        assert_eq!(f.members(f.left), [f.explorer, f.a]);
        assert_eq!(f.get(f.left).active_dockable, Some(f.a));
        assert_eq!(f.get(f.docs).active_dockable, Some(f.b));
        assert_eq!(f.get(f.a).owner, Some(f.left));
        assert_eq!(
            f.take_events(),
            [DockEvent::DockableMoved { dockable: f.a, from: f.docs, from_index: 0, to: f.left, index: 1 }]
        );
        f.assert_consistent();
    }

    #[test]
    fn reorder_within_a_dock() {
        let mut f = fixture();
        f.factory.move_dockable(f.docs, f.docs, f.c, Some(0)).unwrap();
        assert_eq!(f.members(f.docs), [f.c, f.a, f.b]);
        assert_eq!(
            f.take_events(),
            [DockEvent::DockableMoved { dockable: f.c, from: f.docs, from_index: 2, to: f.docs, index: 0 }]
        );
        f.factory.move_dockable(f.docs, f.docs, f.c, Some(0)).unwrap();
        assert!(f.take_events().is_empty());
    }

    #[test]
    fn cannot_move_into_own_descendant() {
        let mut f = fixture();
        let err = f.factory.move_dockable(f.root, f.docs, f.main, None).unwrap_err();
        assert_eq!(err, DockError::from(Violation::IntoDescendant(f.main, f.docs)));
        let err = f.factory.move_dockable(f.left, f.docs, f.a, None).unwrap_err();
        assert_eq!(err, DockError::from(Violation::NotAMember(f.a, f.left)));
        assert!(f.take_events().is_empty());
        f.assert_consistent();
    }

    #[test]
    fn emptying_the_source_prunes_it() {
        let mut f = fixture();
        for doc in [f.a, f.b, f.c] {
            f.factory.move_dockable(f.docs, f.left, doc, None).unwrap();
        }
        assert_eq!(f.event_names(), ["DockableMoved"; 3]);
        assert!(!f.model().contains(f.docs));
        assert_eq!(f.members(f.left), [f.explorer, f.a, f.b, f.c]);
        assert_eq!(f.model().visible_dockables(f.main).count(), 1);
        assert!(close_to(f.get(f.left).proportion, 1.0));
        f.assert_consistent();
    }

    #[test]
    fn swap_exchanges_positions() {
        let mut f = fixture();
        f.factory.swap_dockable(f.docs, f.a, f.c).unwrap();
        assert_eq!(f.members(f.docs), [f.c, f.b, f.a]);
        assert_eq!(f.event_names(), ["DockableMoved"]);
        let err = f.factory.swap_dockable(f.docs, f.a, f.explorer).unwrap_err();
        assert_eq!(err, DockError::from(Violation::NotAMember(f.explorer, f.docs)));
    }

    #[test]
    fn splitters_stay_between_swapped_members() {
        let mut f = fixture();
        let splitter = f.splitter_of(f.main);
        let err = f.factory.swap_dockable(f.main, splitter, f.left).unwrap_err();
        assert_eq!(err, DockError::from(Violation::SplitterNotMovable(splitter)));
        let err = f.factory.move_dockable(f.main, f.main, splitter, Some(0)).unwrap_err();
        assert_eq!(err, DockError::from(Violation::SplitterNotMovable(splitter)));
        assert!(f.take_events().is_empty());

        f.factory.swap_dockable(f.main, f.left, f.docs).unwrap();
        assert_eq!(f.model().visible_dockables(f.main).collect::<Vec<_>>(), [f.docs, splitter, f.left]);
        f.assert_consistent();
    }

    #[test]
    fn moving_respects_the_last_member_guard() {
        let mut f = fixture();
        f.factory.model.get_mut(f.left).unwrap().can_close_last_dockable = false;
        let err = f.factory.move_dockable(f.left, f.docs, f.explorer, None).unwrap_err();
        assert_eq!(err, DockError::from(Violation::LastDockable(f.left)));
        assert!(f.model().contains(f.left));
        assert_eq!(f.members(f.left), [f.explorer]);
        assert!(f.take_events().is_empty());
        f.assert_consistent();
    }

    #[test]
    fn moving_the_focused_dockable_to_another_root_drops_focus() {
        let mut f = fixture();
        let window = f.factory.split_to_window(f.c, Rect::new(0.0, 0.0, 100.0, 100.0), None).unwrap();
        let wrapper = f.get(f.c).owner.unwrap();
        f.factory.set_focused_dockable(f.docs, f.a).unwrap();
        f.take_events();

        f.factory.move_dockable(f.docs, wrapper, f.a, None).unwrap();
        assert_eq!(f.model().window_of(f.a), Some(window));
        assert_eq!(f.model().root_state(f.root).unwrap().focused, None);
        assert!(!f.get(f.a).is_focused);
        assert_eq!(f.event_names(), ["DockableMoved"]);
        f.assert_consistent();
    }
}

mod splitting {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    #[test]
    fn split_to_the_right() {
        let mut f = fixture();
        let container = f.factory.split_to_dock(f.docs, f.c, Edge::Right).unwrap();
        let split = f.members(f.main)[1];

        assert_eq!(f.members(f.main), [f.left, split]);
        assert_eq!(f.get(split).kind, DockKind::Proportional { orientation: Orientation::Horizontal });
        assert_eq!(f.members(split), [f.docs, container]);
        assert_eq!(f.model().visible_dockables(split).count(), 3);
        assert!(f.get(container).kind.is_document_dock());
        assert_eq!(f.members(container), [f.c]);
        assert!(close_to(f.get(split).proportion, 0.75));
        assert!(close_to(f.get(f.docs).proportion, 0.5));
        assert!(close_to(f.get(container).proportion, 0.5));
        assert_eq!(
            f.take_events(),
            [DockEvent::DockableMoved { dockable: f.c, from: f.docs, from_index: 2, to: container, index: 0 }]
        );
        f.assert_consistent();
    }

    #[test]
    fn tools_split_into_a_tool_dock_on_the_leading_edge() {
        let mut f = fixture();
        let container = f.factory.split_to_dock(f.docs, f.explorer, Edge::Top).unwrap();
        assert_eq!(
            f.get(container).kind,
            DockKind::ToolDock { alignment: Edge::Top, auto_hide: false, is_expanded: true }
        );
        // The emptied tool dock went away.
        assert!(!f.model().contains(f.left));
        let split = f.members(f.main)[0];
        assert_eq!(f.members(f.main), [split]);
        assert_eq!(f.get(f.main).active_dockable, Some(split));
        assert_eq!(f.get(split).kind, DockKind::Proportional { orientation: Orientation::Vertical });
        assert_eq!(f.members(split), [container, f.docs]);
        assert!(close_to(f.get(split).proportion, 1.0));
        assert_eq!(f.event_names(), ["DockableMoved"]);
        f.assert_consistent();
    }

    #[test]
    fn invalid_splits() {
        let mut f = fixture();
        let err = f.factory.split_to_dock(f.root, f.a, Edge::Left).unwrap_err();
        assert_eq!(err, DockError::from(Violation::CannotSplitRoot));
        let err = f.factory.split_to_dock(f.left, f.explorer, Edge::Right).unwrap_err();
        assert_eq!(err, DockError::from(Violation::SplitWouldEmptyTarget(f.left)));
        let err = f.factory.split_to_dock(f.a, f.docs, Edge::Right).unwrap_err();
        assert_eq!(err, DockError::from(Violation::IntoDescendant(f.docs, f.a)));
        assert!(f.take_events().is_empty());
        f.assert_consistent();
    }
}

mod windows {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    #[test]
    fn split_to_window_builds_a_fresh_layout() {
        let mut f = fixture();
        let frame = Rect::new(10.0, 20.0, 300.0, 200.0);
        let window = f.factory.split_to_window(f.a, frame, None).unwrap();

        let w = f.model().window(window).unwrap().clone();
        assert_eq!(w.state, WindowState::Created);
        assert_eq!(w.frame, frame);
        assert_eq!(w.title, "A");
        assert_eq!(w.owner_root, f.root);
        let wrapper = f.members(w.layout)[0];
        assert!(f.get(wrapper).kind.is_document_dock());
        assert_eq!(f.members(wrapper), [f.a]);
        assert_eq!(f.model().window_of(f.a), Some(window));
        assert_eq!(f.model().root_state(f.root).unwrap().windows, [window]);
        assert_eq!(f.model().roots(), [f.root, w.layout]);
        assert_eq!(f.members(f.docs), [f.b, f.c]);
        assert_eq!(
            *f.host.borrow(),
            ["create", "title A", "position 10,20", "size 300x200"]
        );
        assert_eq!(f.take_events(), [DockEvent::WindowAdded { window, root: f.root }]);
        f.assert_consistent();
    }

    #[test]
    fn lifecycle_and_tracking() {
        let mut f = fixture();
        let states = Rc::new(RefCell::new(vec![]));
        {
            let states = states.clone();
            f.factory.events().on_tracking_changed(move |t| states.borrow_mut().push(*t));
        }
        let window = f.factory.split_to_window(f.a, Rect::new(0.0, 0.0, 100.0, 100.0), None).unwrap();
        let layout = f.model().window(window).unwrap().layout;

        f.factory.present_window(window).unwrap();
        let err = f.factory.present_window(window).unwrap_err();
        assert_eq!(
            err,
            DockError::from(Violation::InvalidTransition { from: WindowState::Presented, to: WindowState::Presented })
        );

        f.factory.activate_window(window).unwrap();
        f.factory.activate_window(window).unwrap();
        assert_eq!(f.model().window(window).unwrap().state, WindowState::Active);
        assert_eq!(f.factory.tracking().window, Some(window));
        assert_eq!(f.factory.tracking().root, Some(layout));
        assert_eq!(f.factory.tracking().dockable, Some(f.a));

        f.factory.deactivate_window(window).unwrap();
        assert_eq!(f.model().window(window).unwrap().state, WindowState::Inactive);
        assert_eq!(*f.factory.tracking(), TrackingState::default());
        assert_eq!(states.borrow().len(), 2);
        assert_eq!(f.event_names(), ["WindowAdded", "WindowOpened"]);
    }

    #[test]
    fn closing_can_be_vetoed() {
        let mut f = fixture();
        f.factory.add_lifecycle_observer(Veto { dockable: None, windows: true });
        let window = f.factory.split_to_window(f.a, Rect::new(0.0, 0.0, 100.0, 100.0), None).unwrap();
        f.factory.present_window(window).unwrap();
        f.take_events();

        let err = f.factory.close_window(window).unwrap_err();
        assert_eq!(err, DockError::Vetoed(Lifecycle::CloseWindow(window)));
        assert_eq!(err.category(), ErrorCategory::VetoedLifecycle);
        assert_eq!(f.model().window(window).unwrap().state, WindowState::Presented);
        assert!(f.model().contains(f.a));
        assert!(f.take_events().is_empty());
    }

    #[test]
    fn closing_releases_the_layout() {
        let mut f = fixture();
        let window = f.factory.split_to_window(f.a, Rect::new(0.0, 0.0, 100.0, 100.0), None).unwrap();
        f.factory.present_window(window).unwrap();
        f.take_events();

        f.factory.close_window(window).unwrap();
        assert_eq!(
            f.take_events(),
            [DockEvent::WindowClosing { window }, DockEvent::WindowClosed { window }]
        );
        assert_eq!(f.model().window(window).unwrap().state, WindowState::Closed);
        assert!(!f.model().contains(f.a));
        assert!(f.model().root_state(f.root).unwrap().windows.is_empty());
        assert_eq!(f.model().roots(), [f.root]);
        assert_eq!(f.host.borrow().last().map(String::as_str), Some("close"));

        let err = f.factory.close_window(window).unwrap_err();
        assert_eq!(
            err,
            DockError::from(Violation::InvalidTransition { from: WindowState::Closed, to: WindowState::Closing })
        );
        f.assert_consistent();
    }

    #[test]
    fn docking_a_window_back() {
        let mut f = fixture();
        let window = f.factory.split_to_window(f.a, Rect::new(0.0, 0.0, 100.0, 100.0), None).unwrap();
        let layout = f.model().window(window).unwrap().layout;
        f.take_events();

        f.factory.dock_window(window, f.docs, None).unwrap();
        assert_eq!(f.members(f.docs), [f.b, f.c, f.a]);
        assert_eq!(f.get(f.docs).active_dockable, Some(f.a));
        assert!(!f.model().contains(layout));
        assert_eq!(f.model().window(window).unwrap().state, WindowState::Closed);
        assert_eq!(f.take_events(), [DockEvent::WindowRemoved { window, root: f.root }]);
        f.assert_consistent();
    }

    #[test]
    fn float_uses_the_last_arranged_bounds_and_keeps_docks_whole() {
        let mut f = fixture();
        f.factory.arrange(f.root, Rect::new(0.0, 0.0, 804.0, 600.0));
        let window = f.factory.float_dockable(f.docs, None).unwrap();
        let w = f.model().window(window).unwrap();
        assert_eq!(w.frame, Rect::new(204.0, 0.0, 600.0, 600.0));
        assert_eq!(f.members(w.layout), [f.docs]);
        assert_eq!(f.members(f.docs), [f.a, f.b, f.c]);
        assert_eq!(f.model().visible_dockables(f.main).collect::<Vec<_>>(), [f.left]);
        assert!(close_to(f.get(f.left).proportion, 1.0));
        f.assert_consistent();
    }

    #[test]
    fn float_needs_permission() {
        let mut f = fixture();
        f.factory.set_override(f.docs, CapabilityOverride::deny(Capabilities::FLOAT));
        let err = f.factory.float_dockable(f.a, None).unwrap_err();
        assert_eq!(err, DockError::from(Violation::NotPermitted(f.a, Capabilities::FLOAT)));
    }

    #[test]
    fn emptied_window_goes_away() {
        let mut f = fixture();
        let window = f.factory.split_to_window(f.a, Rect::new(0.0, 0.0, 100.0, 100.0), None).unwrap();
        let wrapper = f.get(f.a).owner.unwrap();
        f.take_events();

        f.factory.move_dockable(wrapper, f.docs, f.a, Some(0)).unwrap();
        assert_eq!(f.event_names(), ["DockableMoved"]);
        assert_eq!(f.members(f.docs), [f.a, f.b, f.c]);
        assert_eq!(f.model().window(window).unwrap().state, WindowState::Closed);
        assert_eq!(f.model().roots(), [f.root]);
        f.assert_consistent();
    }

    #[test]
    fn floating_the_focused_dockable_drops_focus() {
        let mut f = fixture();
        f.factory.set_focused_dockable(f.left, f.explorer).unwrap();
        f.take_events();
        let window = f.factory.float_dockable(f.left, None).unwrap();
        assert_eq!(f.model().root_state(f.root).unwrap().focused, None);
        assert!(!f.get(f.explorer).is_focused);
        assert_eq!(f.take_events(), [DockEvent::WindowAdded { window, root: f.root }]);
        f.assert_consistent();
    }

    #[test]
    fn docking_a_window_back_keeps_what_was_parked_in_it() {
        let mut f = fixture();
        let outline = f.factory.add(f.left, Dockable::tool("outline", "Outline"), None).unwrap();
        let props = f.factory.add(f.left, Dockable::tool("props", "Properties"), None).unwrap();
        let window = f.factory.float_dockable(f.left, None).unwrap();
        let layout = f.model().window(window).unwrap().layout;
        f.factory.hide_dockable(f.explorer).unwrap();
        f.factory.pin_dockable(outline).unwrap();
        assert_eq!(f.model().root_of(f.explorer), Some(layout));
        f.take_events();

        f.factory.dock_window(window, f.main, None).unwrap();
        assert!(!f.model().contains(layout));
        assert_eq!(f.members(f.left), [props]);
        let state = f.model().root_state(f.root).unwrap();
        assert_eq!(state.hidden, [f.explorer]);
        assert_eq!(state.pinned.left, [outline]);
        assert!(f.model().is_hidden(f.explorer));
        assert_eq!(f.model().pinned_edge(outline), Some(Edge::Left));
        assert_eq!(f.get(f.explorer).owner, Some(f.left));
        assert_eq!(f.take_events(), [DockEvent::WindowRemoved { window, root: f.root }]);
        f.assert_consistent();

        assert_eq!(f.factory.restore_dockable(f.explorer).unwrap(), f.left);
        assert_eq!(f.members(f.left), [props, f.explorer]);
    }

    #[test]
    fn parked_dockables_whose_dock_is_gone_fall_back_to_the_target() {
        let mut f = fixture();
        let window = f.factory.split_to_window(f.a, Rect::new(0.0, 0.0, 100.0, 100.0), None).unwrap();
        let wrapper = f.get(f.a).owner.unwrap();
        let extra = f.factory.add(wrapper, Dockable::document("extra", "Extra"), None).unwrap();
        f.factory.hide_dockable(extra).unwrap();
        f.take_events();

        f.factory.dock_window(window, f.docs, None).unwrap();
        assert!(!f.model().contains(wrapper));
        assert!(f.model().is_hidden(extra));
        assert_eq!(f.get(extra).owner, Some(f.docs));
        f.assert_consistent();
    }
}

mod parking {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    #[test]
    fn pin_and_unpin() {
        let mut f = fixture();
        let edge = f.factory.pin_dockable(f.explorer).unwrap();
        assert_eq!(edge, Edge::Left);
        let state = f.model().root_state(f.root).unwrap();
        assert_eq!(state.pinned.left, [f.explorer]);
        assert!(f.model().is_parked(f.explorer));
        assert_eq!(f.get(f.explorer).owner, Some(f.left));
        // The tool dock stays so the tool can come back, but takes no space.
        assert!(f.model().contains(f.left));
        assert!(f.model().is_collapsed(f.left));
        assert!(close_to(f.get(f.docs).proportion, 1.0));
        f.assert_consistent();

        f.factory.preview_pinned_dockable(f.explorer).unwrap();
        f.factory.preview_pinned_dockable(f.explorer).unwrap();
        f.factory.hide_previewing_dockables(f.root).unwrap();
        f.factory.hide_previewing_dockables(f.root).unwrap();

        let owner = f.factory.unpin_dockable(f.explorer).unwrap();
        assert_eq!(owner, f.left);
        assert_eq!(f.members(f.left), [f.explorer]);
        assert!(!f.model().is_parked(f.explorer));
        assert!(close_to(f.get(f.left).proportion, 0.2));
        assert!(close_to(f.get(f.docs).proportion, 0.8));
        assert_eq!(
            f.take_events(),
            [
                DockEvent::DockablePinned { dockable: f.explorer, owner: Some(f.left), edge: Edge::Left },
                DockEvent::PinnedPreviewChanged { root: f.root, dockable: Some(f.explorer) },
                DockEvent::PinnedPreviewChanged { root: f.root, dockable: None },
                DockEvent::DockableUnpinned { dockable: f.explorer, owner: f.left },
            ]
        );
        assert_eq!(f.factory.unpin_dockable(f.explorer).unwrap_err(), DockError::from(Violation::NotPinned(f.explorer)));
        f.assert_consistent();
    }

    #[test]
    fn pinning_honours_overrides() {
        let mut f = fixture();
        f.factory.set_override(f.left, CapabilityOverride::deny(Capabilities::PIN));
        let err = f.factory.pin_dockable(f.explorer).unwrap_err();
        assert_eq!(err, DockError::from(Violation::NotPermitted(f.explorer, Capabilities::PIN)));
        assert!(f.take_events().is_empty());
    }

    #[test]
    fn unpin_falls_back_when_the_owner_is_gone() {
        let mut f = fixture();
        f.factory.pin_dockable(f.explorer).unwrap();
        f.factory.remove_dockable(f.left).unwrap();
        assert_eq!(f.get(f.explorer).owner, Some(f.main));

        let owner = f.factory.unpin_dockable(f.explorer).unwrap();
        assert_eq!(owner, f.main);
        assert_eq!(f.members(f.main), [f.docs, f.explorer]);
        assert!(close_to(f.get(f.docs).proportion, 0.5));
        assert!(close_to(f.get(f.explorer).proportion, 0.5));
        f.assert_consistent();
    }

    #[test]
    fn parking_the_focused_dockable_drops_focus() {
        let mut f = fixture();
        f.factory.set_focused_dockable(f.left, f.explorer).unwrap();
        f.take_events();
        f.factory.pin_dockable(f.explorer).unwrap();
        assert_eq!(f.model().root_state(f.root).unwrap().focused, None);
        assert!(!f.get(f.explorer).is_focused);
        assert_eq!(f.event_names(), ["DockablePinned"]);
        f.assert_consistent();

        f.factory.set_focused_dockable(f.docs, f.b).unwrap();
        f.factory.hide_dockable(f.c).unwrap();
        assert_eq!(f.model().root_state(f.root).unwrap().focused, Some(f.b));
        f.factory.hide_dockable(f.b).unwrap();
        assert_eq!(f.model().root_state(f.root).unwrap().focused, None);
        f.assert_consistent();
    }

    #[test]
    fn hide_and_restore() {
        let mut f = fixture();
        f.factory.hide_dockable(f.b).unwrap();
        assert_eq!(f.members(f.docs), [f.a, f.c]);
        assert!(f.model().is_hidden(f.b));
        assert_eq!(f.model().find_by_id("b"), Some(f.b));
        assert_eq!(f.factory.hide_dockable(f.b).unwrap_err(), DockError::from(Violation::AlreadyParked(f.b)));

        let owner = f.factory.restore_dockable(f.b).unwrap();
        assert_eq!(owner, f.docs);
        assert_eq!(f.members(f.docs), [f.a, f.c, f.b]);
        assert_eq!(f.get(f.docs).active_dockable, Some(f.b));
        assert_eq!(
            f.take_events(),
            [
                DockEvent::DockableHidden { dockable: f.b, owner: Some(f.docs) },
                DockEvent::DockableRestored { dockable: f.b, owner: f.docs },
            ]
        );
        assert_eq!(f.factory.restore_dockable(f.b).unwrap_err(), DockError::from(Violation::NotHidden(f.b)));
        f.assert_consistent();
    }

    #[test]
    fn closing_a_pinned_dockable() {
        let mut f = fixture();
        f.factory.pin_dockable(f.explorer).unwrap();
        f.factory.preview_pinned_dockable(f.explorer).unwrap();
        f.take_events();
        f.factory.close_dockable(f.explorer).unwrap();
        let state = f.model().root_state(f.root).unwrap();
        assert!(state.pinned.left.is_empty());
        assert_eq!(state.pinned_preview, None);
        assert_eq!(
            f.take_events(),
            [DockEvent::DockableClosed {
                dockable: f.explorer,
                id: "explorer".into(),
                owner: Some(f.left),
                index: None,
            }]
        );
    }
}

mod activation {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    #[test]
    fn set_active_is_idempotent() {
        let mut f = fixture();
        let calls = Rc::new(RefCell::new(0));
        {
            let calls = calls.clone();
            f.factory.events().on_tracking_changed(move |_| *calls.borrow_mut() += 1);
        }

        f.factory.set_active_dockable(f.c).unwrap();
        assert_eq!(
            f.take_events(),
            [DockEvent::ActiveDockableChanged { dockable: f.c, previous: Some(f.a) }]
        );
        assert_eq!(f.get(f.docs).active_dockable, Some(f.c));
        assert_eq!(f.get(f.main).active_dockable, Some(f.docs));
        assert!(f.get(f.c).is_active);
        assert!(!f.get(f.a).is_active);
        assert_eq!(f.factory.tracking().dockable, Some(f.c));
        assert_eq!(f.factory.tracking().root, Some(f.root));

        f.factory.set_active_dockable(f.c).unwrap();
        assert!(f.take_events().is_empty());
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn already_active_dockable_still_gets_tracked_once() {
        let mut f = fixture();
        f.factory.set_active_dockable(f.a).unwrap();
        f.factory.set_active_dockable(f.a).unwrap();
        assert_eq!(f.event_names(), ["ActiveDockableChanged"]);
    }

    #[test]
    fn parked_dockables_cannot_be_activated() {
        let mut f = fixture();
        f.factory.hide_dockable(f.b).unwrap();
        assert_eq!(f.factory.set_active_dockable(f.b).unwrap_err(), DockError::from(Violation::Detached(f.b)));
    }

    #[test]
    fn focus() {
        let mut f = fixture();
        f.factory.set_focused_dockable(f.root, f.b).unwrap();
        f.factory.set_focused_dockable(f.root, f.b).unwrap();
        f.factory.set_focused_dockable(f.docs, f.c).unwrap();
        assert_eq!(f.model().root_state(f.root).unwrap().focused, Some(f.c));
        assert!(f.get(f.c).is_focused);
        assert!(!f.get(f.b).is_focused);
        // Focus does not move activation.
        assert_eq!(f.get(f.docs).active_dockable, Some(f.a));
        assert_eq!(
            f.take_events(),
            [
                DockEvent::FocusedDockableChanged { root: f.root, dockable: f.b, previous: None },
                DockEvent::FocusedDockableChanged { root: f.root, dockable: f.c, previous: Some(f.b) },
            ]
        );
        let err = f.factory.set_focused_dockable(f.left, f.a).unwrap_err();
        assert_eq!(err, DockError::from(Violation::NotAMember(f.a, f.left)));

        f.factory.remove_dockable(f.c).unwrap();
        assert_eq!(f.model().root_state(f.root).unwrap().focused, None);
        f.assert_consistent();
    }
}

mod closing {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    #[test]
    fn vetoed_dockables_survive_batch_closes() {
        let mut f = fixture();
        f.factory.add_lifecycle_observer(Veto { dockable: Some("b"), windows: false });
        let err = f.factory.close_dockable(f.b).unwrap_err();
        assert_eq!(err, DockError::Vetoed(Lifecycle::CloseDockable(f.b)));
        assert!(f.take_events().is_empty());

        assert_eq!(f.factory.close_all_dockables(f.docs).unwrap(), 2);
        assert_eq!(f.members(f.docs), [f.b]);
        assert_eq!(f.event_names(), ["DockableClosed", "DockableClosed"]);
        f.assert_consistent();
    }

    #[test]
    fn close_left_right_and_others() {
        let mut f = fixture();
        assert_eq!(f.factory.close_left_dockables(f.a).unwrap(), 0);
        assert_eq!(f.factory.close_right_dockables(f.b).unwrap(), 1);
        assert_eq!(f.members(f.docs), [f.a, f.b]);
        assert_eq!(f.factory.close_other_dockables(f.b).unwrap(), 1);
        assert_eq!(f.members(f.docs), [f.b]);
        assert!(!f.model().contains(f.a));
        assert!(!f.model().contains(f.c));
    }

    #[test]
    fn close_needs_permission() {
        let mut f = fixture();
        f.factory.set_override(f.a, CapabilityOverride::deny(Capabilities::CLOSE));
        let err = f.factory.close_dockable(f.a).unwrap_err();
        assert_eq!(err, DockError::from(Violation::NotPermitted(f.a, Capabilities::CLOSE)));
        // Plain removal is not a user close.
        f.factory.remove_dockable(f.a).unwrap();
    }
}

mod documents {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    #[test]
    fn create_document_needs_a_factory() {
        let mut f = fixture();
        let err = f.factory.create_document(f.docs).unwrap_err();
        assert_eq!(err, DockError::from(Violation::CannotCreateDocument(f.docs)));

        f.factory.set_document_factory(|model, dock| {
            let n = model.content_dockables(dock).count();
            Some(Dockable::document(format!("untitled-{n}"), "Untitled"))
        });
        let doc = f.factory.create_document(f.docs).unwrap();
        assert_eq!(f.get(doc).id, "untitled-3");
        assert_eq!(f.get(f.docs).active_dockable, Some(doc));
        assert_eq!(f.event_names(), ["DockableAdded"]);

        let err = f.factory.create_document(f.left).unwrap_err();
        assert_eq!(err, DockError::from(Violation::CannotCreateDocument(f.left)));
    }
}

mod sizing {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    #[test]
    fn dragging_a_splitter() {
        let mut f = fixture();
        for node in [f.left, f.docs] {
            f.factory.model.get_mut(node).unwrap().proportion = 0.5;
        }
        let splitter = f.splitter_of(f.main);
        f.factory.resize_splitter(splitter, 20.0, 200.0).unwrap();
        assert!((f.get(f.left).proportion - 0.6).abs() < 0.01);
        assert!((f.get(f.docs).proportion - 0.4).abs() < 0.01);
        assert_eq!(f.take_events(), [DockEvent::ProportionsChanged { dock: f.main }]);
        f.assert_consistent();

        let err = f.factory.resize_splitter(f.a, 20.0, 200.0).unwrap_err();
        assert_eq!(err, DockError::from(Violation::NotASplitter(f.a)));
    }

    #[test]
    fn configured_minimum_size_limits_splitter_drags() {
        let mut config = Config::default();
        config.layout.default_min_size = 90.0;
        let mut model = DockModel::new("root");
        let main = model.insert(model.root(), Dockable::proportional("main", Orientation::Horizontal));
        let left = model.insert(main, Dockable::tool_dock("left", Edge::Left).with_proportion(0.5));
        model.insert(left, Dockable::tool("explorer", "Explorer"));
        let splitter = model.insert(main, Dockable::splitter("split"));
        let right = model.insert(main, Dockable::document_dock("docs").with_proportion(0.5));
        model.insert(right, Dockable::document("a", "A"));
        let mut factory = Factory::new(model, config);

        factory.resize_splitter(splitter, 50.0, 200.0).unwrap();
        assert!(close_to(factory.model().get(left).unwrap().proportion, 0.55));
        assert!(close_to(factory.model().get(right).unwrap().proportion, 0.45));
        factory.resize_splitter(splitter, 10.0, 200.0).unwrap();
        assert!(close_to(factory.model().get(right).unwrap().proportion, 0.45));
    }

    #[test]
    fn arrange_records_bounds() {
        let mut f = fixture();
        let layout = f.factory.arrange(f.root, Rect::new(0.0, 0.0, 804.0, 600.0));
        assert_eq!(layout.rect(f.a), Some(Rect::new(204.0, 0.0, 600.0, 600.0)));
        assert_eq!(f.get(f.a).bounds, Some(Rect::new(204.0, 0.0, 600.0, 600.0)));
        assert_eq!(f.get(f.b).bounds, None);
        assert!(f.take_events().is_empty());
    }
}

#[test]
fn init_layout_replaces_everything() {
    let mut f = fixture();
    f.factory.set_active_dockable(f.b).unwrap();
    f.take_events();
    let model = DockModel::new("fresh");
    let root = model.root();
    f.factory.init_layout(model);
    assert_eq!(f.factory.model().root(), root);
    assert_eq!(*f.factory.tracking(), TrackingState::default());
    assert_eq!(f.take_events(), [DockEvent::LayoutInitialized { root }]);
}

#[test]
fn init_layout_assigns_missing_proportions() {
    let mut f = fixture();
    let mut model = DockModel::new("fresh");
    let main = model.insert(model.root(), Dockable::proportional("main", Orientation::Vertical));
    let top = model.insert(main, Dockable::document_dock("top"));
    model.insert(top, Dockable::document("x", "X"));
    let bottom = model.insert(main, Dockable::document_dock("bottom"));
    model.insert(bottom, Dockable::document("y", "Y"));
    f.factory.init_layout(model);

    assert!(close_to(f.get(top).proportion, 0.5));
    assert!(close_to(f.get(bottom).proportion, 0.5));
    let splitters = f.model().visible_dockables(main).filter(|&n| f.model().is_splitter(n)).count();
    assert_eq!(splitters, 1);
    assert_eq!(f.model().violations(), Vec::<String>::new());
}
