//! Link- and network-layer decoding of captured frames.
//!
//! Only Ethernet II frames carrying IPv4 are of interest. Everything else
//! (ARP, IPv6, malformed headers) decodes to `None` and is skipped by the
//! recorder without touching any counter.

use std::net::Ipv4Addr;

use etherparse::{EtherType, Ethernet2Header, Ipv4HeaderSlice};

/// The fields of a decoded packet that the recorder needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
    /// Network-layer length in bytes, excluding the link-layer header.
    pub payload_len: u64,
}

/// Turns raw captured bytes into a [`Packet`].
pub trait FrameDecoder: Send + Sync {
    fn decode(&self, frame: &[u8]) -> Option<Packet>;
}

/// Decoder for Ethernet II link types.
#[derive(Debug, Clone, Copy, Default)]
pub struct EthernetDecoder;

impl FrameDecoder for EthernetDecoder {
    fn decode(&self, frame: &[u8]) -> Option<Packet> {
        let (eth, payload) = Ethernet2Header::from_slice(frame).ok()?;
        if eth.ether_type != EtherType::IPV4 {
            return None;
        }
        decode_ipv4(payload)
    }
}

/// Decode an IPv4 packet starting at the first byte of `data`.
///
/// The length comes from the header's total-length field so that Ethernet
/// trailer padding is not counted and snaplen-truncated frames still report
/// the size that went over the wire. A total length shorter than the header
/// itself falls back to the captured byte count.
pub fn decode_ipv4(data: &[u8]) -> Option<Packet> {
    let ip = Ipv4HeaderSlice::from_slice(data).ok()?;
    let header_len = ip.slice().len();
    let total_len = usize::from(ip.total_len());
    let payload_len = if total_len >= header_len {
        total_len
    } else {
        data.len()
    };

    Some(Packet {
        source: ip.source_addr(),
        destination: ip.destination_addr(),
        payload_len: payload_len as u64,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    const ETH_HLEN: usize = 14;

    /// Build an Ethernet II frame carrying a minimal IPv4 packet with
    /// `ip_payload` bytes after the 20-byte IP header.
    pub(crate) fn build_ipv4_frame(src: [u8; 4], dst: [u8; 4], ip_payload: usize) -> Vec<u8> {
        let total_length = (20 + ip_payload) as u16;
        let mut frame = vec![0u8; ETH_HLEN + total_length as usize];

        // Destination and source MACs.
        frame[0..6].copy_from_slice(&[0x02, 0, 0, 0, 0, 0x01]);
        frame[6..12].copy_from_slice(&[0x02, 0, 0, 0, 0, 0x02]);
        // EtherType IPv4.
        frame[12] = 0x08;
        frame[13] = 0x00;

        let ip = &mut frame[ETH_HLEN..];
        // Version 4, IHL 5.
        ip[0] = 0x45;
        ip[2..4].copy_from_slice(&total_length.to_be_bytes());
        // TTL and protocol (UDP).
        ip[8] = 64;
        ip[9] = 17;
        ip[12..16].copy_from_slice(&src);
        ip[16..20].copy_from_slice(&dst);

        frame
    }

    /// Build a minimal ARP request frame.
    pub(crate) fn build_arp_frame() -> Vec<u8> {
        let mut frame = vec![0u8; ETH_HLEN + 28];
        frame[0..6].copy_from_slice(&[0xff; 6]);
        frame[6..12].copy_from_slice(&[0x02, 0, 0, 0, 0, 0x02]);
        frame[12] = 0x08;
        frame[13] = 0x06;
        frame
    }

    #[test]
    fn test_decode_valid_ipv4_frame() {
        let frame = build_ipv4_frame([192, 168, 1, 5], [8, 8, 8, 8], 80);
        let packet = EthernetDecoder.decode(&frame).unwrap();
        assert_eq!(packet.source, Ipv4Addr::new(192, 168, 1, 5));
        assert_eq!(packet.destination, Ipv4Addr::new(8, 8, 8, 8));
        // 20-byte header + 80 bytes, Ethernet header excluded.
        assert_eq!(packet.payload_len, 100);
    }

    #[test]
    fn test_decode_ignores_ethernet_padding() {
        // 20-byte IP packet padded to the 60-byte Ethernet minimum.
        let mut frame = build_ipv4_frame([10, 0, 0, 1], [10, 0, 0, 2], 0);
        frame.resize(60, 0);
        let packet = EthernetDecoder.decode(&frame).unwrap();
        assert_eq!(packet.payload_len, 20);
    }

    #[test]
    fn test_decode_truncated_frame_reports_wire_length() {
        let mut frame = build_ipv4_frame([10, 0, 0, 1], [10, 0, 0, 2], 1400);
        frame.truncate(ETH_HLEN + 64);
        let packet = EthernetDecoder.decode(&frame).unwrap();
        assert_eq!(packet.payload_len, 1420);
    }

    #[test]
    fn test_decode_arp_is_skipped() {
        assert!(EthernetDecoder.decode(&build_arp_frame()).is_none());
    }

    #[test]
    fn test_decode_ipv6_ethertype_is_skipped() {
        let mut frame = build_ipv4_frame([10, 0, 0, 1], [10, 0, 0, 2], 8);
        frame[12] = 0x86;
        frame[13] = 0xDD;
        assert!(EthernetDecoder.decode(&frame).is_none());
    }

    #[test]
    fn test_decode_empty_and_short_frames() {
        assert!(EthernetDecoder.decode(&[]).is_none());
        assert!(EthernetDecoder.decode(&[0u8; 10]).is_none());

        // Valid Ethernet header, IPv4 header cut short.
        let mut frame = build_ipv4_frame([10, 0, 0, 1], [10, 0, 0, 2], 0);
        frame.truncate(ETH_HLEN + 12);
        assert!(EthernetDecoder.decode(&frame).is_none());
    }

    #[test]
    fn test_decode_wrong_ip_version_is_skipped() {
        let mut frame = build_ipv4_frame([10, 0, 0, 1], [10, 0, 0, 2], 8);
        frame[ETH_HLEN] = 0x65;
        assert!(EthernetDecoder.decode(&frame).is_none());
    }
}
