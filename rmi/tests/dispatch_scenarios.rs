use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use rmi::{
    Attachment, CarrierRegistry, ChannelId, Dispatcher, EntityId, ErrorReporter, IncomingCall,
    InvocationFailure, InvokeError, MethodDescriptor, MethodRegistry, NetworkedObject,
    OutgoingCall, RmiConfig, RmiError, RmiFlags, RmiParameters, RmiTarget, Role,
};
use sync::{CrySync, LimitKind, SyncError, SyncResult, Synchronizable, Vec3};

#[derive(Debug, Default)]
struct Actor {
    id: u32,
    owner: Option<i32>,
    foo_calls: u32,
    teleports: Vec<Vec3>,
    notes: Vec<String>,
    hits: u32,
}

impl NetworkedObject for Actor {
    fn network_id(&self) -> EntityId {
        EntityId::new(self.id)
    }

    fn owner_channel(&self) -> ChannelId {
        self.owner.map_or(ChannelId::NONE, ChannelId::new)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Teleport {
    destination: Vec3,
    instant: bool,
}

impl Synchronizable for Teleport {
    fn synchronize(&mut self, sync: &mut CrySync) -> SyncResult<()> {
        sync.sync("destination", &mut self.destination)?;
        sync.sync_or("instant", &mut self.instant, false)
    }
}

impl RmiParameters for Teleport {
    const TYPE_NAME: &'static str = "Teleport";
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Note {
    text: String,
}

impl Synchronizable for Note {
    fn synchronize(&mut self, sync: &mut CrySync) -> SyncResult<()> {
        sync.sync("text", &mut self.text)
    }
}

impl RmiParameters for Note {
    const TYPE_NAME: &'static str = "Note";
}

#[derive(Clone, Default)]
struct SharedReporter(Rc<RefCell<Vec<InvocationFailure>>>);

impl ErrorReporter for SharedReporter {
    fn report(&mut self, failure: InvocationFailure) {
        self.0.borrow_mut().push(failure);
    }
}

fn methods() -> MethodRegistry {
    let mut methods = MethodRegistry::new();
    methods
        .register(
            MethodDescriptor::of::<Actor>("Foo")
                .marker(RmiFlags::new(Attachment::NoAttach, true, false, true))
                .invoke(|actor: &mut Actor| {
                    actor.foo_calls += 1;
                    Ok(true)
                }),
        )
        .unwrap();
    methods
        .register(
            MethodDescriptor::of::<Actor>("Teleport")
                .marker(RmiFlags::new(Attachment::PreAttach, false, false, false))
                .invoke_with(|actor: &mut Actor, params: &Teleport| {
                    actor.teleports.push(params.destination);
                    Ok(true)
                }),
        )
        .unwrap();
    methods
        .register(
            MethodDescriptor::of::<Actor>("Post")
                .marker(RmiFlags::new(Attachment::PostAttach, false, false, true))
                .invoke_with(|actor: &mut Actor, params: &Note| {
                    actor.notes.push(params.text.clone());
                    Ok(true)
                }),
        )
        .unwrap();
    methods
        .register(
            MethodDescriptor::of::<Actor>("Explode")
                .marker(RmiFlags::new(Attachment::NoAttach, false, false, true))
                .invoke(|_: &mut Actor| Err(InvokeError::new("no charge"))),
        )
        .unwrap();
    methods
        .register(
            MethodDescriptor::of::<Actor>("Flicker")
                .marker(RmiFlags::new(Attachment::NoAttach, false, true, false))
                .invoke(|_: &mut Actor| Err(InvokeError::new("bulb missing"))),
        )
        .unwrap();
    methods
        .register(
            MethodDescriptor::of::<Actor>("Hit")
                .marker(RmiFlags::new(Attachment::NoAttach, false, false, false))
                .invoke(|actor: &mut Actor| {
                    actor.hits += 1;
                    Ok(actor.hits < 2)
                }),
        )
        .unwrap();
    methods
        .register(MethodDescriptor::of::<Actor>("Local").invoke(|_: &mut Actor| Ok(true)))
        .unwrap();
    methods
}

fn carriers() -> CarrierRegistry {
    let mut carriers = CarrierRegistry::new();
    carriers.register::<Teleport>().unwrap();
    carriers.register::<Note>().unwrap();
    carriers
}

fn dispatcher(role: Role) -> Dispatcher<Vec<OutgoingCall>> {
    Dispatcher::new(
        RmiConfig::for_testing(role),
        methods(),
        carriers(),
        Vec::new(),
    )
}

fn actor(id: u32) -> Actor {
    Actor {
        id,
        ..Actor::default()
    }
}

#[test]
fn scenario_a_client_calls_server_method() {
    let mut client = dispatcher(Role::Client);
    let mut server = dispatcher(Role::Server);
    let sender = actor(7);

    let flags = client
        .call_remote(&sender, "Foo", RmiTarget::TO_SERVER, None, ChannelId::NONE)
        .unwrap();
    assert!(flags.is_reliable() && flags.is_to_server());

    let sent = client.transport_mut().pop().unwrap();
    assert_eq!(sent.sender, EntityId::new(7));
    assert_eq!(sent.flags.encode(), flags.encode());
    assert!(sent.payload.is_empty());

    let mut receiver = actor(7);
    assert!(server.on_remote_call_received(&mut receiver, &sent.into()));
    assert_eq!(receiver.foo_calls, 1);
}

#[test]
fn scenario_b_client_channel_without_channel() {
    let mut server = dispatcher(Role::Server);
    let sender = actor(1);
    let err = server
        .call_remote(
            &sender,
            "Teleport",
            RmiTarget::TO_CLIENT_CHANNEL,
            Some(&mut Teleport::default()),
            ChannelId::NONE,
        )
        .unwrap_err();
    assert_eq!(err, RmiError::ChannelNotSpecified { channel: -1 });
    assert!(server.transport().is_empty());

    // A to-server method aimed at a client channel fails the direction rule
    // first, before the channel is ever looked at.
    let mut client = dispatcher(Role::Client);
    let err = client
        .call_remote(&sender, "Foo", RmiTarget::TO_CLIENT_CHANNEL, None, ChannelId::NONE)
        .unwrap_err();
    assert!(matches!(err, RmiError::MustBeDirectedToServer { .. }));
    assert!(client.transport().is_empty());
}

#[test]
fn scenario_c_server_method_not_directed_to_server() {
    let mut client = dispatcher(Role::Client);
    let sender = actor(1);
    let err = client
        .call_remote(&sender, "Foo", RmiTarget::TO_ALL_CLIENTS, None, ChannelId::NONE)
        .unwrap_err();
    assert!(matches!(err, RmiError::MustBeDirectedToServer { .. }));
    assert!(client.transport().is_empty());
}

#[test]
fn carrier_travels_with_call() {
    let mut server = dispatcher(Role::Server);
    let mut client = dispatcher(Role::Client);
    let sender = Actor {
        id: 3,
        owner: Some(4),
        ..Actor::default()
    };
    let mut params = Teleport {
        destination: Vec3::new(10.0, 0.0, -2.5),
        instant: true,
    };
    server
        .call_remote(
            &sender,
            "Teleport",
            RmiTarget::TO_OWN_CLIENT,
            Some(&mut params),
            ChannelId::NONE,
        )
        .unwrap();
    let sent = server.transport_mut().pop().unwrap();
    assert_eq!(sent.carrier_type.as_deref(), Some("Teleport"));
    assert_eq!(sent.flags.attachment(), Attachment::PreAttach);

    let mut receiver = actor(3);
    assert!(client.on_remote_call_received(&mut receiver, &sent.into()));
    assert_eq!(receiver.teleports, vec![Vec3::new(10.0, 0.0, -2.5)]);
}

#[test]
fn oversized_carrier_is_refused_before_sending() {
    let mut server = dispatcher(Role::Server);
    let sender = Actor {
        id: 5,
        owner: Some(2),
        ..Actor::default()
    };
    let mut note = Note {
        text: "x".repeat(1025),
    };
    let err = server
        .call_remote(
            &sender,
            "Post",
            RmiTarget::TO_OWN_CLIENT,
            Some(&mut note),
            ChannelId::NONE,
        )
        .unwrap_err();
    assert_eq!(
        err,
        RmiError::Sync(SyncError::LimitExceeded {
            kind: LimitKind::BlobLength,
            limit: 1024,
            actual: 1025,
        })
    );
    assert!(server.transport().is_empty());

    let mut note = Note {
        text: "x".repeat(1024),
    };
    server
        .call_remote(
            &sender,
            "Post",
            RmiTarget::TO_OWN_CLIENT,
            Some(&mut note),
            ChannelId::NONE,
        )
        .unwrap();
    let sent = server.transport_mut().pop().unwrap();
    let mut client = dispatcher(Role::Client);
    let mut receiver = actor(5);
    assert!(client.on_remote_call_received(&mut receiver, &sent.into()));
    assert_eq!(receiver.notes, vec!["x".repeat(1024)]);
}

#[test]
fn unknown_method_is_local_error_on_send() {
    let mut client = dispatcher(Role::Client);
    let err = client
        .call_remote(&actor(1), "Missing", RmiTarget::TO_SERVER, None, ChannelId::NONE)
        .unwrap_err();
    assert!(matches!(err, RmiError::MethodNotFound { .. }));
}

#[test]
fn unknown_method_is_dropped_on_receive() {
    let mut server = dispatcher(Role::Server);
    let call = IncomingCall {
        sender: EntityId::new(1),
        method: "Missing".into(),
        carrier_type: None,
        payload: Vec::new(),
    };
    assert!(!server.on_remote_call_received(&mut actor(1), &call));
}

#[test]
fn wrong_direction_is_dropped_on_receive() {
    let mut client = dispatcher(Role::Client);
    let call = IncomingCall {
        sender: EntityId::new(1),
        method: "Foo".into(),
        carrier_type: None,
        payload: Vec::new(),
    };
    let mut receiver = actor(1);
    assert!(!client.on_remote_call_received(&mut receiver, &call));
    assert_eq!(receiver.foo_calls, 0);

    let mut listen = dispatcher(Role::ListenServer);
    assert!(listen.on_remote_call_received(&mut receiver, &call));
}

#[test]
fn unmarked_method_never_invoked_remotely() {
    let mut server = dispatcher(Role::Server);
    let call = IncomingCall {
        sender: EntityId::new(1),
        method: "Local".into(),
        carrier_type: None,
        payload: Vec::new(),
    };
    assert!(!server.on_remote_call_received(&mut actor(1), &call));
    assert!(matches!(
        server.call_remote(&actor(1), "Local", RmiTarget::TO_ALL_CLIENTS, None, ChannelId::NONE),
        Err(RmiError::NotRemoteCallable { .. })
    ));
}

#[test]
fn bad_carrier_payloads_are_dropped() {
    let mut client = dispatcher(Role::Client);
    let mut receiver = actor(1);
    let base = IncomingCall {
        sender: EntityId::new(1),
        method: "Teleport".into(),
        carrier_type: Some("Teleport".into()),
        payload: vec![0xAB, 0xCD],
    };
    assert!(!client.on_remote_call_received(&mut receiver, &base));

    let wrong_type = IncomingCall {
        carrier_type: Some("Other".into()),
        ..base.clone()
    };
    assert!(!client.on_remote_call_received(&mut receiver, &wrong_type));

    let missing = IncomingCall {
        carrier_type: None,
        ..base
    };
    assert!(!client.on_remote_call_received(&mut receiver, &missing));
    assert!(receiver.teleports.is_empty());
}

#[test]
fn reliable_failure_escalates_unreliable_is_swallowed() {
    let reporter = SharedReporter::default();
    let mut client = dispatcher(Role::Client).with_reporter(reporter.clone());
    let mut receiver = actor(9);
    let call = |method: &str| IncomingCall {
        sender: EntityId::new(2),
        method: method.into(),
        carrier_type: None,
        payload: Vec::new(),
    };

    assert!(!client.on_remote_call_received(&mut receiver, &call("Explode")));
    assert!(!client.on_remote_call_received(&mut receiver, &call("Flicker")));

    let failures = reporter.0.borrow();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].method, "Actor::Explode");
    assert_eq!(failures[0].receiver, EntityId::new(9));
    assert_eq!(failures[0].error.message(), "no charge");
}

#[test]
fn success_flag_is_returned() {
    let mut client = dispatcher(Role::Client);
    let mut receiver = actor(1);
    let call = IncomingCall {
        sender: EntityId::new(1),
        method: "Hit".into(),
        carrier_type: None,
        payload: Vec::new(),
    };
    assert!(client.on_remote_call_received(&mut receiver, &call));
    assert!(!client.on_remote_call_received(&mut receiver, &call));
    assert_eq!(receiver.hits, 2);
}

#[test]
fn peers_agree_on_registry_digest() {
    assert_eq!(methods().digest(), methods().digest());
    assert_ne!(methods().digest(), MethodRegistry::new().digest());
}
