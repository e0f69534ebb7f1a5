#![no_std]
#![no_main]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::wildcard_imports)]

use core::fmt;

use defmt_rtt as _;
use panic_probe as _;
use rtic_heater::{
    config::Config,
    time::{Duration, Instant},
};
use rtic_monotonics::{stm32::Tim2 as Mono, Monotonic};
use stm32f0xx_hal::{
    gpio::{
        gpioa::{PA15, PA2},
        Alternate, AF1,
    },
    pac::USART2,
    serial::Serial,
};

const CONFIG: Config = Config::DEFAULT;

/// Display refresh period, in menu polls.
const REFRESH_POLLS: u32 = 200;

type Usart = Serial<USART2, PA2<Alternate<AF1>>, PA15<Alternate<AF1>>>;

/// Current time on the wrapping 32 bit millisecond clock the controller runs on.
fn now() -> Instant {
    #[allow(clippy::cast_possible_truncation)]
    let ms = Mono::now().duration_since_epoch().to_millis() as u32;
    Instant::from_ticks(ms)
}

fn mono_duration(duration: Duration) -> <Mono as Monotonic>::Duration {
    <Mono as Monotonic>::Duration::millis(u64::from(duration.to_millis()))
}

#[rtic::app(device = stm32f0xx_hal::pac, dispatchers = [USART1, TIM14])]
mod app {
    use defmt::{panic, unreachable, *};
    use rtic_heater::{
        config::{CHANNELS, CONTROL_CHANNEL, LOG_DEPTH},
        display::{self, Line},
        heater::PinHeater,
        heater_control::HeaterController,
        menu::{Button, Encoder, Input, Menu},
        storage::Storage,
        temp_controller::{Sample, TempController},
        terminal::{get_line, is_newline, write_error, Command, BUFFER_SIZE},
        thermometer::max6675::ThermocoupleReader,
        time,
    };
    use rtic_monotonics::{
        stm32::{Tim2 as Mono, *},
        Monotonic,
    };
    use rtic_sync::{
        channel::{ReceiveError, Receiver, Sender},
        make_channel,
    };
    use stm32f0xx_hal::{
        gpio::{
            gpioa::{PA5, PA6, PA7},
            Alternate, Input as PinInput, Output, Pin, PullUp, PushPull, AF0,
        },
        pac::{Interrupt, IWDG, SPI1},
        prelude::*,
        serial,
        serial::{Event, Serial},
        spi::{EightBit, Mode, Phase, Polarity, Spi},
        watchdog::Watchdog,
    };

    use crate::{Usart, CONFIG};

    type HeaterPin = Pin<Output<PushPull>>;
    type ThermocoupleSpi =
        Spi<SPI1, PA5<Alternate<AF0>>, PA6<Alternate<AF0>>, PA7<Alternate<AF0>>, EightBit>;

    /// MAX6675 shifts data out on the falling edge
    const MAX6675_MODE: Mode = Mode {
        polarity: Polarity::IdleLow,
        phase: Phase::CaptureOnSecondTransition,
    };

    #[shared]
    struct Shared {
        usart: Usart,
        buffer: heapless::Deque<u8, BUFFER_SIZE>,
        heater: HeaterController<PinHeater<HeaterPin>>,
        storage: Storage<LOG_DEPTH, CHANNELS>,
    }

    #[local]
    struct Local {
        // Temperature Controller
        reader: ThermocoupleReader<ThermocoupleSpi, Pin<Output<PushPull>>, CHANNELS>,
        temp_controller: TempController<CHANNELS>,
        tx: Sender<'static, Sample<CHANNELS>, 1>,

        // Front panel
        menu: Menu,
        button: Button,
        encoder: Encoder,
        button_pin: Pin<PinInput<PullUp>>,
        encoder_a: Pin<PinInput<PullUp>>,
        encoder_b: Pin<PinInput<PullUp>>,
    }

    #[init]
    fn init(mut cx: init::Context) -> (Shared, Local) {
        // Set system clock to 24 MHz
        let mut rcc = cx
            .device
            .RCC
            .configure()
            .hsi48()
            .sysclk(24.mhz())
            .pclk(24.mhz())
            .hclk(24.mhz())
            .freeze(&mut cx.device.FLASH);

        trace!("sysclk: {}", rcc.clocks.sysclk().0);
        trace!("pclk: {}", rcc.clocks.pclk().0);

        // Enable tim2 monotonic
        let token = rtic_monotonics::create_stm32_tim2_monotonic_token!();
        Mono::start(24_000_000, token);

        // Setup GPIO
        let gpioa = cx.device.GPIOA.split(&mut rcc);
        let gpiob = cx.device.GPIOB.split(&mut rcc);
        let pb3 = gpiob.pb3.into_push_pull_output(&cx.cs);

        let _ = blinky::spawn(pb3.downgrade());
        let _ = watchdog::spawn(cx.device.IWDG);

        // Setup USART & USART interrupt
        let mut usart = Serial::usart2(
            cx.device.USART2,
            (
                gpioa.pa2.into_alternate_af1(&cx.cs),
                gpioa.pa15.into_alternate_af1(&cx.cs),
            ),
            115_200.bps(),
            &mut rcc,
        );
        usart.listen(Event::Rxne);
        rtic::pend(Interrupt::USART2);

        // Setup heater, off until enabled
        let heater_pin = gpiob.pb4.into_push_pull_output(&cx.cs).downgrade();
        let heater = CONFIG
            .heater_controller(PinHeater::new(heater_pin))
            .unwrap_or_else(|e| match e {});

        // Setup thermocouples on SPI1, one chip select each
        let spi = Spi::spi1(
            cx.device.SPI1,
            (
                gpioa.pa5.into_alternate_af0(&cx.cs),
                gpioa.pa6.into_alternate_af0(&cx.cs),
                gpioa.pa7.into_alternate_af0(&cx.cs),
            ),
            MAX6675_MODE,
            1.mhz(),
            &mut rcc,
        );
        let cs = [
            gpioa.pa4.into_push_pull_output(&cx.cs).downgrade(),
            gpiob.pb1.into_push_pull_output(&cx.cs).downgrade(),
        ];
        let reader = ThermocoupleReader::new(spi, cs).unwrap_or_else(|e| match e {});
        let temp_controller = TempController::new(CONTROL_CHANNEL, &CONFIG);

        // Setup front panel
        let button_pin = gpioa.pa3.into_pull_up_input(&cx.cs).downgrade();
        let encoder_a = gpioa.pa0.into_pull_up_input(&cx.cs).downgrade();
        let encoder_b = gpioa.pa1.into_pull_up_input(&cx.cs).downgrade();

        // Setup channels
        let (tx, rx) = make_channel!(Sample<CHANNELS>, 1);

        // Launch tasks
        let _ = control::spawn();
        let _ = storage::spawn(rx);
        let _ = panel::spawn();

        info!("heater ready, target {=f32}", CONFIG.target.to_num::<f32>());

        (
            Shared {
                usart,
                buffer: heapless::Deque::new(),
                heater,
                storage: Storage::new(),
            },
            Local {
                reader,
                temp_controller,
                tx,
                menu: Menu::new(&CONFIG),
                button: Button::new(),
                encoder: Encoder::new(),
                button_pin,
                encoder_a,
                encoder_b,
            },
        )
    }

    #[idle]
    fn idle(_: idle::Context) -> ! {
        rtic::pend(Interrupt::USART2);

        loop {
            cortex_m::asm::wfi();
        }
    }

    #[task(priority = 1)]
    async fn blinky(_: blinky::Context, mut pin: Pin<Output<PushPull>>) {
        unwrap!(pin.set_low());
        let mut now = Mono::now();
        loop {
            unwrap!(pin.toggle());
            now += 500.millis();
            Mono::delay_until(now).await;
        }
    }

    #[task(priority = 1)]
    async fn watchdog(_: watchdog::Context, wdg: IWDG) {
        let mut wdg = Watchdog::new(wdg);
        wdg.start(1.hz());

        loop {
            wdg.feed();
            Mono::delay(100.millis()).await;
        }
    }

    #[task(priority = 2, local = [reader, temp_controller, tx], shared = [heater])]
    async fn control(mut cx: control::Context) {
        let mut next = Mono::now();
        loop {
            let now = crate::now();
            let sample = cx.shared.heater.lock(|heater| {
                cx.local
                    .temp_controller
                    .run(cx.local.reader, heater, now)
                    .unwrap_or_else(|e| match e {})
            });

            if cx.local.tx.try_send(sample).is_err() {
                trace!("storage busy, sample dropped");
            }

            next += crate::mono_duration(CONFIG.control_period);
            Mono::delay_until(next).await;
        }
    }

    #[task(priority = 1, shared = [storage])]
    async fn storage(mut cx: storage::Context, mut rx: Receiver<'static, Sample<CHANNELS>, 1>) {
        let mut last_write: Option<time::Instant> = None;
        loop {
            let sample = match rx.recv().await {
                Ok(sample) => sample,
                Err(ReceiveError::Empty) => continue,
                Err(ReceiveError::NoSender) => unreachable!("Sender dropped"),
            };

            let now = crate::now();
            if last_write.is_some_and(|at| time::elapsed(now, at) < CONFIG.log_period) {
                continue;
            }
            last_write = Some(now);

            cx.shared.storage.lock(|storage| {
                storage.write(now, &sample.temps, sample.heating);
            });
        }
    }

    #[task(
        priority = 1,
        local = [menu, button, encoder, button_pin, encoder_a, encoder_b, polls: u32 = 0, shown: Option<[Line; 2]> = None],
        shared = [heater]
    )]
    async fn panel(mut cx: panel::Context) {
        loop {
            let now = crate::now();

            let press = cx.local.button.poll(unwrap!(cx.local.button_pin.is_low()), now);
            let detent = cx.local.encoder.poll(
                unwrap!(cx.local.encoder_a.is_high()),
                unwrap!(cx.local.encoder_b.is_high()),
            );

            let mut changed = false;
            for input in [press.map(Input::Press), detent.map(Input::Rotate)]
                .into_iter()
                .flatten()
            {
                changed = true;
                let menu = &mut *cx.local.menu;
                cx.shared.heater.lock(|heater| {
                    let status = heater.status(now);
                    if let Some(action) = menu.handle(input, &status) {
                        action.apply(heater, now).unwrap_or_else(|e| match e {});
                    }
                });
            }

            *cx.local.polls += 1;
            if changed || *cx.local.polls >= crate::REFRESH_POLLS {
                *cx.local.polls = 0;

                let status = cx.shared.heater.lock(|heater| heater.status(now));
                let lines = display::render(cx.local.menu.screen(), &status);
                if cx.local.shown.as_ref() != Some(&lines) {
                    info!("{=str} | {=str}", lines[0].as_str(), lines[1].as_str());
                    *cx.local.shown = Some(lines);
                }
            }

            Mono::delay(1.millis()).await;
        }
    }

    #[task(priority = 2, shared = [usart, buffer, heater, storage])]
    async fn terminal(mut cx: terminal::Context) {
        while let Some(line) = cx.shared.buffer.lock(get_line) {
            let now = crate::now();
            match Command::parse(&line) {
                Ok(command) => crate::execute(&mut cx, command, now),
                Err(e) => crate::print(&mut cx, |tx| write_error(tx, &e)),
            }
        }
    }

    #[task(binds = USART2, local = [times: u32 = 0], shared = [usart, buffer])]
    fn usart2(cx: usart2::Context) {
        *cx.local.times += 1;

        // Read & echo all available bytes from the usart
        (cx.shared.usart, cx.shared.buffer).lock(|usart, buffer| loop {
            match usart.read() {
                Ok(b) => {
                    // Echo back
                    if is_newline(b) {
                        let _ = nb::block!(usart.write(b'\r'));
                        let _ = nb::block!(usart.write(b'\n'));
                    } else {
                        let _ = nb::block!(usart.write(b));
                    }

                    // Line too long, drop it
                    if buffer.push_back(b).is_err() {
                        warn!("terminal line exceeds {=usize} bytes", BUFFER_SIZE);
                        buffer.clear();
                    }
                }
                Err(nb::Error::WouldBlock) => break,
                Err(nb::Error::Other(serial::Error::Framing)) => {
                    panic!("USART error: Framing");
                }
                Err(nb::Error::Other(serial::Error::Noise)) => panic!("USART error: Noise"),
                Err(nb::Error::Other(serial::Error::Overrun)) => {
                    panic!("USART error: Overrun");
                }
                Err(nb::Error::Other(serial::Error::Parity)) => {
                    panic!("USART error: Parity");
                }

                Err(nb::Error::Other(_)) => panic!("USART error: Unknown"),
            }
        });

        trace!("USART2 interrupt fired: {}", *cx.local.times);

        // Trigger terminal task to handle input
        let _ = terminal::spawn();
    }

    timestamp!("{=u64:us}", {
        Mono::now().duration_since_epoch().to_micros()
    });
}

fn print(cx: &mut app::terminal::Context<'_>, f: impl FnOnce(&mut Usart) -> fmt::Result) {
    use rtic::Mutex;

    cx.shared.usart.lock(|tx| {
        if f(tx).is_err() {
            defmt::panic!("Failed to write to UART");
        }
    });
}

#[cfg_attr(feature = "sizing", inline(never))]
fn execute(
    cx: &mut app::terminal::Context<'_>,
    command: rtic_heater::terminal::Command,
    now: Instant,
) {
    use core::fmt::Write;

    use rtic::Mutex;
    use rtic_heater::terminal::{self, Command, Switch, HELP_STR, OK_STR};

    match command {
        Command::Empty => {}
        Command::Help => print(cx, |tx| tx.write_str(HELP_STR)),
        Command::Temp => {
            let entry = cx.shared.storage.lock(|storage| storage.recent());
            print(cx, |tx| match entry {
                Some(entry) => terminal::write_entry(tx, &entry),
                None => tx.write_str("<empty>\r\n"),
            });
        }
        Command::Status => {
            let status = cx.shared.heater.lock(|heater| heater.status(now));
            print(cx, |tx| terminal::write_status(tx, &status));
        }
        Command::Heater(None) => {
            let status = cx.shared.heater.lock(|heater| heater.status(now));
            print(cx, |tx| terminal::write_enabled(tx, &status));
        }
        Command::Heater(Some(switch)) => {
            cx.shared
                .heater
                .lock(|heater| match switch {
                    Switch::On => {
                        heater.enable(now);
                        Ok(())
                    }
                    Switch::Off => heater.disable(now),
                    Switch::Toggle => heater.toggle(now),
                })
                .unwrap_or_else(|e| match e {});
            print(cx, |tx| tx.write_str(OK_STR));
        }
        Command::Target(None) => {
            let status = cx.shared.heater.lock(|heater| heater.status(now));
            print(cx, |tx| terminal::write_target(tx, &status));
        }
        Command::Target(Some(target)) => {
            cx.shared.heater.lock(|heater| heater.set_target(target));
            print(cx, |tx| tx.write_str(OK_STR));
        }
        Command::AutoOff(None) => {
            let status = cx.shared.heater.lock(|heater| heater.status(now));
            print(cx, |tx| terminal::write_auto_off(tx, &status));
        }
        Command::AutoOff(Some(budget)) => {
            cx.shared
                .heater
                .lock(|heater| heater.set_time_until_disable(budget, now));
            print(cx, |tx| tx.write_str(OK_STR));
        }
        Command::DumpTemps => {
            let usart = &mut cx.shared.usart;
            cx.shared.storage.lock(|storage| {
                for entry in storage.oldest() {
                    usart.lock(|tx| {
                        if terminal::write_entry(tx, &entry).is_err() {
                            defmt::panic!("Failed to write to UART");
                        }
                    });
                }
            });
            print(cx, |tx| tx.write_str(OK_STR));
        }
        Command::Erase => {
            cx.shared.storage.lock(|storage| storage.clear());
            defmt::info!("temperature log erased");
            print(cx, |tx| tx.write_str(OK_STR));
        }
        Command::Reset => {
            print(cx, |tx| tx.write_str("Resetting...\r\n"));
            cortex_m::peripheral::SCB::sys_reset();
        }
    }
}
