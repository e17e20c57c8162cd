use std::{cell::RefCell, rc::Rc, sync::Arc};
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;
#[cfg(target_arch = "wasm32")]
use winit::event_loop::EventLoopProxy;
#[cfg(target_arch = "wasm32")]
use once_cell::sync::OnceCell;
#[cfg(target_arch = "wasm32")]
use wasm_bindgen_futures::future_to_promise;
#[cfg(target_arch = "wasm32")]
use js_sys::Promise;

pub mod clock;
pub mod color;
pub mod field;
pub mod models;
pub mod projection;
pub mod resize;
pub mod surface;
mod ui_events;
mod app_state;

pub use field::{FieldAnimator, FieldConfig, Node, ParticleField};
pub use surface::{Bounds, DrawSurface};
pub use ui_events::UserCommand;
use app_state::State;

#[cfg(target_arch = "wasm32")]
static WASM_API_INSTANCE: OnceCell<WasmApi> = OnceCell::new();

#[cfg(target_arch = "wasm32")]
static WASM_READY_FLUME_CHANNEL: OnceCell<(flume::Sender<()>, flume::Receiver<()>)> = OnceCell::new();


struct App {
    window: Option<Arc<Window>>,
    // State holds the frame clock, which is tied to this thread.
    state: Rc<RefCell<Option<State>>>,
    field_config: FieldConfig,
}

impl App {
    fn new(#[cfg(target_arch = "wasm32")] event_loop: &EventLoop<UserCommand>, field_config: FieldConfig) -> Self {
        #[cfg(target_arch = "wasm32")]
        {
            let wasm_api_instance = WasmApi { proxy: event_loop.create_proxy() };
            if WASM_API_INSTANCE.set(wasm_api_instance).is_err() {
                log::warn!("WASM_API_INSTANCE was already set. This should only happen once.");
            }
        }

        Self {
            window: None,
            state: Rc::new(RefCell::new(None)),
            field_config,
        }
    }
}

impl ApplicationHandler<UserCommand> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes()
            .with_title("Node Field");

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            const CANVAS_ID: &str = "canvas";

            let window = wgpu::web_sys::window().unwrap_throw();
            let document = window.document().unwrap_throw();
            let canvas = document.get_element_by_id(CANVAS_ID).unwrap_throw();
            let html_canvas_element = canvas.unchecked_into();
            window_attributes = window_attributes.with_canvas(Some(html_canvas_element));
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };
        self.window = Some(window.clone());

        #[cfg(not(target_arch = "wasm32"))]
        {
            match pollster::block_on(State::new(window.clone(), self.field_config.clone())) {
                Ok(mut state) => {
                    let current_size = window.inner_size();
                    state.resize(current_size.width, current_size.height);
                    self.state.borrow_mut().replace(state);
                    window.request_redraw();
                }
                Err(e) => {
                    log::error!("Failed to create State: {e:#}");
                    event_loop.exit();
                }
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let state_for_spawn = self.state.clone();
            let field_config = self.field_config.clone();
            let Some(proxy_for_init_notification) = WASM_API_INSTANCE.get().map(|api| api.proxy.clone()) else {
                log::error!("WASM_API_INSTANCE missing, cannot report initialization.");
                return;
            };

            wasm_bindgen_futures::spawn_local(async move {
                match State::new(window.clone(), field_config).await {
                    Ok(mut state_instance) => {
                        log::info!("WASM State created in async task.");
                        let initial_size = window.inner_size();
                        state_instance.resize(initial_size.width, initial_size.height);
                        state_for_spawn.borrow_mut().replace(state_instance);

                        log::info!("WASM State assigned to App. Sending initialization notification.");
                        if proxy_for_init_notification.send_event(UserCommand::StateInitialized).is_err() {
                            log::error!("Failed to send StateInitialized event.");
                        }
                    },
                    Err(e) => log::error!("Failed to create State in WASM: {:?}", e),
                }
            });
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: UserCommand) {
        match event {
            UserCommand::StateInitialized => {
                log::info!("WASM State initialized and ready.");
                // Signal to the promise resolver
                #[cfg(target_arch = "wasm32")]
                if let Some((sender, _)) = WASM_READY_FLUME_CHANNEL.get() {
                    if let Err(e) = sender.send(()) {
                        log::error!("Failed to send WASM ready signal: {:?}", e);
                    }
                }
                if let Some(w_handle) = self.window.as_ref() {
                    w_handle.request_redraw();
                }
            }
            _ => {
                if let Some(state) = self.state.borrow_mut().as_mut() {
                    state.process_command(event);
                    if let Some(w_handle) = self.window.as_ref() {
                        w_handle.request_redraw();
                    }
                } else {
                    log::warn!("Received a command before state was initialized (via proxy). Ignoring: {:?}", event);
                }
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let mut state_guard = self.state.borrow_mut();
        let Some(state) = state_guard.as_mut() else {
            log::trace!("Window event received before State was initialized, ignoring.");
            return;
        };
        let Some(window_handle) = self.window.as_ref() else {
            return;
        };

        let mut needs_redraw = false;

        match event {
            WindowEvent::CloseRequested => {
                state.stop_field();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                state.resize(size.width, size.height);
                needs_redraw = true;
            }
            WindowEvent::RedrawRequested => {
                match state.render() {
                    Ok(_) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        state.resize(state.config.width, state.config.height)
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("GPU out of memory, exiting.");
                        state.stop_field();
                        event_loop.exit();
                    }
                    Err(e) => log::error!("{:?}", e),
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: key_state,
                        repeat,
                        ..
                    },
                ..
            } => {
                if key_state.is_pressed() && !repeat {
                    match code {
                        KeyCode::KeyR => log::info!("FPS: {}", state.current_fps),
                        KeyCode::Space => {
                            state.process_command(UserCommand::Restart);
                            needs_redraw = true;
                        }
                        KeyCode::Escape => {
                            state.stop_field();
                            event_loop.exit();
                        }
                        _ => {}
                    }
                }
            },
            _ => {}
        }

        if needs_redraw {
            window_handle.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        // Drop State (and its animator) before the window goes away.
        self.state.borrow_mut().take();
    }
}

cfg_if::cfg_if! {
    if #[cfg(target_arch = "wasm32")] {
        /// Browser logging and the ready channel. Config arrives later through `WasmApi`.
        fn init_platform() -> anyhow::Result<FieldConfig> {
            console_error_panic_hook::set_once();
            console_log::init_with_level(log::Level::Info)
                .map_err(|e| anyhow::anyhow!("Failed to initialize console logging: {e}"))?;
            log::info!("Starting node field.");
            let (sender, receiver) = flume::unbounded();
            if WASM_READY_FLUME_CHANNEL.set((sender, receiver)).is_err() {
                anyhow::bail!("WASM ready channel was already initialized.");
            }
            log::info!("WASM ready channel created and stored.");
            Ok(FieldConfig::default())
        }
    } else {
        /// `RUST_LOG` driven logging and the optional `NODEFIELD_CONFIG` file.
        fn init_platform() -> anyhow::Result<FieldConfig> {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
            FieldConfig::from_env()
        }
    }
}

pub fn run() -> anyhow::Result<()> {
    let field_config = init_platform()?;

    let event_loop = EventLoop::with_user_event().build()?;
    let mut app = App::new(
        #[cfg(target_arch = "wasm32")]
        &event_loop,
        field_config,
    );
    event_loop.run_app(&mut app)?;

    Ok(())
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn run_web() -> Result<(), wasm_bindgen::JsValue> {
    run().map_err(|e| JsValue::from_str(&format!("{e:#}")))
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
#[derive(Clone, Debug)]
pub struct WasmApi {
    proxy: EventLoopProxy<UserCommand>,
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
impl WasmApi {
    #[wasm_bindgen(js_name = setFieldConfig)]
    pub fn set_field_config(&self, config_json: &str) -> Result<(), JsValue> {
        let config = FieldConfig::from_json(config_json)
            .map_err(|e| JsValue::from_str(&format!("{e:#}")))?;

        log::info!("Received SetConfig command from JS.");
        self.send(UserCommand::SetConfig(config))
    }

    pub fn restart(&self) -> Result<(), JsValue> {
        self.send(UserCommand::Restart)
    }

    /// Stops the animation, for when the hosting page unmounts the canvas.
    pub fn teardown(&self) -> Result<(), JsValue> {
        self.send(UserCommand::Teardown)
    }

    fn send(&self, command: UserCommand) -> Result<(), JsValue> {
        self.proxy
            .send_event(command)
            .map_err(|_| JsValue::from_str("Failed to send command to event loop."))
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(js_name = getWasmApi)]
pub fn get_wasm_api() -> Result<WasmApi, JsValue> {
    WASM_API_INSTANCE.get()
        .cloned()
        .ok_or_else(|| JsValue::from_str("WasmApi is not initialized. Call run_web() first."))
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(js_name = getWasmReadyPromise)]
pub fn get_wasm_ready_promise() -> Result<Promise, JsValue> {
    let (_, receiver) = WASM_READY_FLUME_CHANNEL.get()
        .ok_or_else(|| JsValue::from_str("WASM ready channel is not initialized. Call run_web() first."))?;
    let receiver = receiver.clone();

    let ready_promise = future_to_promise(async move {
        receiver
            .recv_async()
            .await
            .map_err(|e| JsValue::from_str(&format!("WASM ready channel closed: {e}")))?;
        Ok(JsValue::NULL)
    });

    Ok(ready_promise)
}
