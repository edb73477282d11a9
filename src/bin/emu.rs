use std::{path::PathBuf, sync::Arc, time::Instant};

use anyhow::Context;
use clap::Parser;
use pixels::{Pixels, SurfaceTexture};
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{Key, KeyCode, NamedKey},
    window::{Window, WindowId},
};

use ocho::emu::{Cpu, Runner, SCREEN_H, SCREEN_W, Screen};
use ocho::u4;

const WINDOW_TITLE: &str = "ocho";
/// The rate at which pixels fade out (phosphor decay).
const PHOSPHOR_RATE: f32 = 10.0;

/// Mapping from physical keyboard keys to the hex keypad (0x0-0xF).
const KEY_MAP: [KeyCode; 16] = [
    KeyCode::KeyX,   // 0x0
    KeyCode::Digit1, // 0x1
    KeyCode::Digit2, // 0x2
    KeyCode::Digit3, // 0x3
    KeyCode::KeyQ,   // 0x4
    KeyCode::KeyW,   // 0x5
    KeyCode::KeyE,   // 0x6
    KeyCode::KeyA,   // 0x7
    KeyCode::KeyS,   // 0x8
    KeyCode::KeyD,   // 0x9
    KeyCode::KeyZ,   // 0xA
    KeyCode::KeyC,   // 0xB
    KeyCode::Digit4, // 0xC
    KeyCode::KeyR,   // 0xD
    KeyCode::KeyF,   // 0xE
    KeyCode::KeyV,   // 0xF
];

struct App {
    pixels: Option<Pixels<'static>>,
    window: Option<Arc<Window>>,
    /// Per-pixel brightness (0.0 to 1.0) for the phosphor decay effect.
    brightness: Screen<f32>,
    /// Whether the window title currently shows the beep marker.
    beep_shown: bool,

    runner: Runner,
    /// Used for delta time calculation.
    last_frame_instant: Instant,

    /// Stores the result of the application to be returned from main.
    exit_result: anyhow::Result<()>,
}

impl App {
    fn new(rom: &[u8]) -> anyhow::Result<Self> {
        let mut cpu = Cpu::default();
        cpu.load(rom).context("Failed to load ROM into memory")?;

        Ok(Self {
            pixels: None,
            window: None,
            brightness: [[0.0; SCREEN_W]; SCREEN_H],
            beep_shown: false,

            runner: Runner::new(cpu),
            last_frame_instant: Instant::now(),
            exit_result: Ok(()),
        })
    }

    fn process_display(&mut self, dt: f32) {
        let buff = self.pixels.as_mut().unwrap().frame_mut();

        for (i, pxl) in buff.chunks_exact_mut(4).enumerate() {
            let x = i % SCREEN_W;
            let y = i / SCREEN_W;

            // Lit pixels snap to full brightness; unlit ones decay over time
            // instead of turning off instantly.
            self.brightness[y][x] = if self.runner.pixel(y, x) {
                1.0
            } else {
                (self.brightness[y][x] - PHOSPHOR_RATE * dt).max(0.0)
            };

            let rgba = [0, 0xFF, 0, (self.brightness[y][x] * 255.0) as u8];
            pxl.copy_from_slice(&rgba);
        }
    }

    /// No audio output (out of scope); the sound state is surfaced by
    /// marking the window title while the sound timer runs.
    fn process_sound(&mut self) {
        let beeping = self.runner.sound_active();
        if beeping != self.beep_shown {
            self.beep_shown = beeping;

            let title = if beeping {
                format!("{WINDOW_TITLE} [beep]")
            } else {
                WINDOW_TITLE.to_string()
            };
            if let Some(window) = self.window.as_ref() {
                window.set_title(&title);
            }
        }
    }

    fn try_resumed(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let window = {
            let size = LogicalSize::new(SCREEN_W as u32 * 10, SCREEN_H as u32 * 10);
            let min_size = LogicalSize::new(SCREEN_W as u32, SCREEN_H as u32);

            Arc::new(
                event_loop
                    .create_window(
                        Window::default_attributes()
                            .with_title(WINDOW_TITLE)
                            .with_inner_size(size)
                            .with_min_inner_size(min_size),
                    )
                    .context("Failed to create window")?,
            )
        };

        self.window = Some(window.clone());
        self.pixels = {
            let window_size = window.inner_size();
            let surface_texture =
                SurfaceTexture::new(window_size.width, window_size.height, window.clone());

            let pixels = Pixels::new(SCREEN_W as u32, SCREEN_H as u32, surface_texture)
                .context("Failed to create pixels surface")?;

            window.request_redraw();
            Some(pixels)
        };

        // Avoid large dt on first frame
        self.last_frame_instant = Instant::now();
        Ok(())
    }

    fn try_window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        event: WindowEvent,
    ) -> anyhow::Result<()> {
        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(NamedKey::Escape),
                        ..
                    },
                ..
            } => {
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                self.pixels
                    .as_mut()
                    .unwrap()
                    .resize_surface(size.width, size.height)
                    .context("Failed to resize pixels surface")?;
            }

            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let dt = (now - self.last_frame_instant).as_secs_f32();
                self.last_frame_instant = now;

                self.runner.update(dt).context("Execution fault")?;

                self.process_sound();
                self.process_display(dt);

                self.pixels
                    .as_ref()
                    .unwrap()
                    .render()
                    .context("Pixels render error")?;

                self.window.as_ref().unwrap().request_redraw();
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if let Some(key) = KEY_MAP.iter().position(|&k| k == event.physical_key) {
                    let pressed = event.state == ElementState::Pressed;
                    self.runner.set_key(u4::new(key as u8), pressed);
                }
            }

            _ => (),
        }
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let Err(e) = self.try_resumed(event_loop) {
            self.exit_result = Err(e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if let Err(e) = self.try_window_event(event_loop, event) {
            self.exit_result = Err(e);
            event_loop.exit();
        }
    }
}

/// CHIP-8 emulator.
///
/// Keys 1-4, Q-R, A-F, Z-V map to the hex keypad.
/// Escape exits the emulator.
#[derive(Parser, Debug)]
#[command(about)]
struct Args {
    /// Path to the ROM file
    rom_path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let rom = std::fs::read(&args.rom_path).context("Failed to read ROM file")?;

    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(&rom).context("Failed to initialize application")?;
    event_loop
        .run_app(&mut app)
        .context("Error occurred during event loop execution")?;

    // Return the result captured during the event loop
    app.exit_result
}
