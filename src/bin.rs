#![no_main]
#![no_std]

use core::sync::atomic::{AtomicUsize, Ordering};

use defmt::{debug, info, trace, warn};
use defmt_brtt as _; // global logger
use embedded_hal::serial::Read as _;
use panic_probe as _;

use neo8m_gps::{
    blocking::BlockingGps, config::GpsConfig, nmea::generator::GGA_ONLY, Gps, GpsIngest,
    GpsPoll, ParseStatus,
};
use rtic_monotonics::{
    create_systick_token,
    systick::{ExtU32, Systick},
};
use stm32l4xx_hal::{
    delay::Delay,
    gpio::{Alternate, PushPull, PA2, PA3},
    pac::USART2,
    prelude::*,
    serial::{self, Config, Serial},
};

type Usart2 = Serial<USART2, (PA2<Alternate<PushPull, 7>>, PA3<Alternate<PushPull, 7>>)>;

static GPS: Gps = Gps::new();

// same panicking *behavior* as `panic-probe` but doesn't print a panic message
// this prevents the panic message being printed *twice* when `defmt::panic` is invoked
#[defmt::panic_handler]
fn panic() -> ! {
    cortex_m::asm::udf()
}

static COUNT: AtomicUsize = AtomicUsize::new(0);
defmt::timestamp!("{=usize}", {
    // NOTE(no-CAS) `timestamps` runs with interrupts disabled
    let n = COUNT.load(Ordering::Relaxed);
    COUNT.store(n + 1, Ordering::Relaxed);
    n
});

#[rtic::app(
    device = stm32l4xx_hal::pac,
    dispatchers = [EXTI2],
)]
mod app {
    use super::*;

    #[shared]
    struct Shared {}

    #[local]
    struct Local {
        uart: Usart2,
        ingest: GpsIngest<'static>,
    }

    #[init]
    fn init(cx: init::Context) -> (Shared, Local) {
        trace!("init enter");

        let mut flash = cx.device.FLASH.constrain();
        let mut rcc = cx.device.RCC.constrain();
        let mut pwr = cx.device.PWR.constrain(&mut rcc.apb1r1);
        let clocks = rcc.cfgr.freeze(&mut flash.acr, &mut pwr);

        let mut gpioa = cx.device.GPIOA.split(&mut rcc.ahb2);

        // Initialize UART for GPS
        let tx = gpioa
            .pa2
            .into_alternate(&mut gpioa.moder, &mut gpioa.otyper, &mut gpioa.afrl);
        let rx = gpioa
            .pa3
            .into_alternate(&mut gpioa.moder, &mut gpioa.otyper, &mut gpioa.afrl);

        let config = GpsConfig::default();
        let uart = Serial::usart2(
            cx.device.USART2,
            (tx, rx),
            Config::default().baudrate(config.baud_rate.bps()),
            clocks,
            &mut rcc.apb1r1,
        );

        // Polled startup: set the output rates, then wait for a first fix
        // before handing the port over to the interrupt
        let delay = Delay::new(cx.core.SYST, clocks);
        let mut gps = BlockingGps::new(uart, delay, config);
        if gps.configure(&GGA_ONLY).is_err() {
            warn!("could not configure GPS output rates");
        }
        match gps.read_fix(gps.config().max_attempts) {
            Ok(fix) => {
                info!("startup fix: {}", fix);
                GPS.state().write(fix);
            }
            Err(e) => warn!("no startup fix: {}", e),
        }
        let (mut uart, delay) = gps.release();

        // Create SysTick monotonic for task scheduling
        Systick::start(delay.free(), clocks.sysclk().0, create_systick_token!());

        let (ingest, poll) = GPS.try_split().unwrap();
        uart.listen(serial::Event::Rxne);

        gps_task::spawn(poll).map_err(|_| ()).unwrap();

        info!("done initializing!");
        trace!("init exit");
        (Shared {}, Local { uart, ingest })
    }

    #[idle]
    fn idle(_: idle::Context) -> ! {
        loop {
            // Only sleep in release mode, since the debugger doesn't interact with sleep very nicely
            #[cfg(debug_assertions)]
            cortex_m::asm::nop();
            #[cfg(not(debug_assertions))]
            cortex_m::asm::wfi();
        }
    }

    // Move received bytes into the ring, nothing else
    #[task(binds = USART2, priority = 10, local = [uart, ingest])]
    fn on_uart(cx: on_uart::Context) {
        // Overrun and framing errors lose the byte, the checksum catches the rest
        if let Ok(b) = cx.local.uart.read() {
            // A full ring drops the byte; it is already counted and logged
            cx.local.ingest.ingest_byte(b).ok();
        }
    }

    // Parse whatever the interrupt has queued
    #[task(priority = 1)]
    async fn gps_task(_cx: gps_task::Context, mut poll: GpsPoll<'static>) {
        trace!("gps_task enter");

        loop {
            match poll.poll() {
                Some(ParseStatus::Valid) => {
                    let fix = GPS.current_fix();
                    debug!("fix: {}", fix);
                }
                Some(ParseStatus::ValidLowConfidence) => debug!("low confidence fix"),
                Some(ParseStatus::Invalid) | None => (),
            }
            if let Some(dt) = GPS.datetime() {
                trace!("utc: {}", dt.timestamp());
            }
            let dropped = GPS.dropped_bytes();
            if dropped > 0 {
                trace!("dropped {} bytes so far", dropped);
            }
            Systick::delay(100.millis()).await;
        }
    }
}
