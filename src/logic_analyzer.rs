//! PIO + DMA logic analyzer
//!
//! One state machine samples eight adjacent pins per *SYSCLK* cycle,
//! autopushing every four samples into its RX FIFO, which a DMA channel drains into the buffer.
//! The program is installed fresh on every arm because the trigger pin and level are baked
//! into its first instruction.
use defmt::*;
use tinyqv_bringup::{
    config::CAPTURE_WORDS, CaptureBuffer, CaptureConfig, CaptureEngine, CaptureError,
    CaptureHandle, Level,
};

use crate::bsp::hal::{
    dma::{self, SingleChannel},
    pac, pio,
};

type Buffer = &'static mut [u32; CAPTURE_WORDS];

/// Resources parked while no capture is armed
struct Idle<P: pio::PIOExt, SMI: pio::StateMachineIndex, CH> {
    sm: pio::UninitStateMachine<(P, SMI)>,
    dma_chan: CH,
    buf: Buffer,
}

pub(crate) struct PioCapture<P: pio::PIOExt, SMI: pio::StateMachineIndex, CH> {
    pio: pio::PIO<P>,
    idle: Option<Idle<P, SMI, CH>>,
    sample_base: u8,
}

/// A running capture
pub(crate) struct Armed<P: pio::PIOExt, SMI: pio::StateMachineIndex, CH: SingleChannel> {
    sm: pio::StateMachine<(P, SMI), pio::Running>,
    tx: pio::Tx<(P, SMI)>,
    transfer: dma::single_buffer::Transfer<CH, pio::Rx<(P, SMI)>, Buffer>,
    dma_id: u8,
}

impl<P, SMI, CH> PioCapture<P, SMI, CH>
where
    P: pio::PIOExt,
    SMI: pio::StateMachineIndex,
    CH: SingleChannel,
{
    /// `sample_base` is the lowest of the eight sampled pins
    pub(crate) fn new(
        pio: pio::PIO<P>,
        sm: pio::UninitStateMachine<(P, SMI)>,
        dma_chan: CH,
        buf: Buffer,
        sample_base: u8,
    ) -> Self {
        Self {
            pio,
            idle: Some(Idle { sm, dma_chan, buf }),
            sample_base,
        }
    }
}

impl<P, SMI, CH> CaptureHandle for Armed<P, SMI, CH>
where
    P: pio::PIOExt,
    SMI: pio::StateMachineIndex,
    CH: SingleChannel,
{
    fn is_done(&self) -> bool {
        self.transfer.is_done()
    }
}

impl<P, SMI, CH> CaptureEngine for PioCapture<P, SMI, CH>
where
    P: pio::PIOExt,
    SMI: pio::StateMachineIndex,
    CH: SingleChannel,
{
    type Handle = Armed<P, SMI, CH>;

    fn arm(&mut self, config: &CaptureConfig) -> Result<Self::Handle, CaptureError> {
        let Some(idle) = self.idle.take() else {
            return Err(CaptureError::Busy);
        };

        let mut a = ::pio::Assembler::<{ ::pio::RP2040_MAX_PROGRAM_SIZE }>::new();
        let mut wrap_source = a.label();
        let mut wrap_target = a.label();
        {
            use ::pio::*;
            let polarity = match config.trigger_level() {
                Level::High => 1,
                Level::Low => 0,
            };
            a.wait(polarity, WaitSource::GPIO, config.trigger_pin(), false);
            a.bind(&mut wrap_target);
            a.r#in(InSource::PINS, 8);
            a.bind(&mut wrap_source);
        }
        let program = a.assemble_with_wrap(wrap_source, wrap_target);

        let installed = match self.pio.install(&program) {
            Ok(installed) => installed,
            Err(_) => {
                self.idle = Some(idle);
                return Err(CaptureError::ProgramSpace);
            }
        };
        let (mut sm, rx, tx) = pio::PIOBuilder::from_program(installed)
            .in_pin_base(self.sample_base)
            .autopush(true)
            // 0 encodes a full 32-bit word
            .push_threshold(0)
            // First sample ends up in the low byte
            .in_shift_direction(pio::ShiftDirection::Right)
            .clock_divisor_fixed_point(1, 0)
            .build(idle.sm);
        sm.restart();

        idle.buf.fill(0);
        let dma_id = idle.dma_chan.id();
        // The channel has to be listening before the sampler can push anything
        let transfer = dma::single_buffer::Config::new(idle.dma_chan, rx, idle.buf).start();
        let sm = sm.start();
        debug!(
            "sampler armed: pins {}..{}, trigger gpio {} = {}",
            self.sample_base,
            self.sample_base + 8,
            config.trigger_pin(),
            config.trigger_level().is_high()
        );

        Ok(Armed {
            sm,
            tx,
            transfer,
            dma_id,
        })
    }

    fn disarm(&mut self, handle: Self::Handle) -> CaptureBuffer {
        let Armed {
            sm,
            tx,
            transfer,
            dma_id,
        } = handle;
        let sm = sm.stop();

        let complete = transfer.is_done();
        if !complete {
            // SAFETY: only the bit of the channel owned by this transfer is written
            let dma = unsafe { &*pac::DMA::ptr() };
            dma.chan_abort.write(|w| unsafe { w.bits(1 << dma_id) });
            while dma.chan_abort.read().bits() & (1 << dma_id) != 0 {}
        }
        let (dma_chan, mut rx, buf) = transfer.wait();
        while rx.read().is_some() {}

        let (sm, installed) = sm.uninit(rx, tx);
        self.pio.uninstall(installed);

        let capture = CaptureBuffer::from_words(buf, complete);
        self.idle = Some(Idle { sm, dma_chan, buf });
        capture
    }
}
