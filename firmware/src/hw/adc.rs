//! Divider-scaled channel reads on the STM32G0 ADC.
//!
//! Each trailer circuit reaches an ADC pin through a 4.7:1 divider. Samples
//! are converted against VDDA, which is measured through the factory-trimmed
//! internal reference rather than assumed to be the nominal 3.3 V.

#![cfg(target_os = "none")]

use core::ptr;

use embassy_stm32::adc::{Adc, AnyAdcChannel, SampleTime, VrefInt};
use embassy_stm32::peripherals::ADC1;
use tester_core::channels::{ADC_REFERENCE_VOLTS, CHANNEL_COUNT, Channel, scale_divider_reading};
use tester_core::peripherals::{ChannelReader, PeripheralFault};

/// Factory-programmed VREFINT reading taken at 3.0 V.
const VREFINT_CAL_ADDR: *const u16 = 0x1FFF_75AA as *const u16;
const VREFINT_CAL_VOLTS: f32 = 3.0;
const FULL_SCALE_COUNTS: f32 = 4095.0;

fn read_vrefint_calibration() -> u16 {
    unsafe { ptr::read_volatile(VREFINT_CAL_ADDR) }
}

pub struct DividerAdc<'d> {
    adc: Adc<'d, ADC1>,
    vrefint: VrefInt,
    inputs: [AnyAdcChannel<ADC1>; CHANNEL_COUNT],
    vdda: f32,
}

impl<'d> DividerAdc<'d> {
    /// Takes ADC inputs in catalog order and calibrates VDDA once.
    pub fn new(mut adc: Adc<'d, ADC1>, inputs: [AnyAdcChannel<ADC1>; CHANNEL_COUNT]) -> Self {
        adc.set_sample_time(SampleTime::CYCLES160_5);
        let vrefint = adc.enable_vrefint();
        let mut reader = Self {
            adc,
            vrefint,
            inputs,
            vdda: ADC_REFERENCE_VOLTS,
        };
        // First conversion after enabling the reference is unreliable.
        let _ = reader.adc.blocking_read(&mut reader.vrefint);
        reader.recalibrate();
        reader
    }

    /// Re-measures VDDA; keeps the nominal reference when the sample is unusable.
    pub fn recalibrate(&mut self) -> f32 {
        let sample = self.adc.blocking_read(&mut self.vrefint);
        let calibration = read_vrefint_calibration();
        self.vdda = if sample == 0 || calibration == 0 {
            ADC_REFERENCE_VOLTS
        } else {
            VREFINT_CAL_VOLTS * f32::from(calibration) / f32::from(sample)
        };
        self.vdda
    }

    pub fn vdda(&self) -> f32 {
        self.vdda
    }
}

impl ChannelReader for DividerAdc<'_> {
    fn read_voltage(&mut self, channel: Channel) -> Result<f32, PeripheralFault> {
        let input = self
            .inputs
            .get_mut(channel.as_index())
            .ok_or(PeripheralFault::Disconnected)?;
        let counts = self.adc.blocking_read(input);
        let pin_volts = f32::from(counts) * self.vdda / FULL_SCALE_COUNTS;
        Ok(scale_divider_reading(pin_volts))
    }
}
