//! Volume fan-out over live replica servers.

use std::io;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use basalt_controller::Volume;
use basalt_dataconn::{DataServer, Endpoint, RemoteClient, Stream};
use basalt_types::{ReaderAt, UnmapperAt, WriterAt};

struct MemStore {
    data: Mutex<Vec<u8>>,
}

impl MemStore {
    fn new(size: usize) -> Arc<Self> {
        Arc::new(Self {
            data: Mutex::new(vec![0u8; size]),
        })
    }

    fn snapshot(&self) -> Vec<u8> {
        self.data.lock().unwrap().clone()
    }
}

impl ReaderAt for MemStore {
    fn read_at(&self, buf: &mut [u8], offset: i64) -> io::Result<usize> {
        let data = self.data.lock().unwrap();
        let offset = offset as usize;
        let end = offset + buf.len();
        if end > data.len() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "out of range"));
        }
        buf.copy_from_slice(&data[offset..end]);
        Ok(buf.len())
    }
}

impl WriterAt for MemStore {
    fn write_at(&self, buf: &[u8], offset: i64) -> io::Result<usize> {
        let mut data = self.data.lock().unwrap();
        let offset = offset as usize;
        let end = offset + buf.len();
        if end > data.len() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "out of range"));
        }
        data[offset..end].copy_from_slice(buf);
        Ok(buf.len())
    }
}

impl UnmapperAt for MemStore {
    fn unmap_at(&self, length: u32, offset: i64) -> io::Result<usize> {
        let mut data = self.data.lock().unwrap();
        let offset = offset as usize;
        let end = (offset + length as usize).min(data.len());
        for byte in &mut data[offset..end] {
            *byte = 0;
        }
        Ok(length as usize)
    }
}

fn start_replica(size: usize) -> (Arc<MemStore>, RemoteClient) {
    let store = MemStore::new(size);
    let server = DataServer::bind(
        &Endpoint::Tcp("127.0.0.1:0".to_string()),
        Arc::clone(&store),
    )
    .unwrap();
    let endpoint = server.local_endpoint().unwrap();
    thread::spawn(move || {
        let _ = server.listen_and_serve();
    });

    let client = RemoteClient::new(
        Stream::connect(&endpoint).unwrap(),
        Duration::from_secs(2),
    )
    .unwrap();
    (store, client)
}

#[test]
fn write_reaches_every_replica() {
    let (store_a, client_a) = start_replica(1 << 16);
    let (store_b, client_b) = start_replica(1 << 16);
    let volume = Volume::new("vol0", vec![client_a, client_b]);

    let payload = vec![0x5A; 1024];
    assert_eq!(volume.write_at(&payload, 2048).unwrap(), payload.len());

    assert_eq!(&store_a.snapshot()[2048..3072], payload.as_slice());
    assert_eq!(&store_b.snapshot()[2048..3072], payload.as_slice());

    let mut buf = vec![0u8; 1024];
    volume.read_at(&mut buf, 2048).unwrap();
    assert_eq!(buf, payload);

    volume.close();
}

#[test]
fn degraded_volume_still_writes() {
    let (_store_a, client_a) = start_replica(1 << 16);
    let (store_b, client_b) = start_replica(1 << 16);

    // One replica drops out before the write.
    client_a.set_error("replica gone");
    let volume = Volume::new("vol0", vec![client_a, client_b]);
    assert_eq!(volume.healthy_replica_count(), 1);

    let payload = vec![0x11; 512];
    assert_eq!(volume.write_at(&payload, 0).unwrap(), payload.len());
    assert_eq!(&store_b.snapshot()[..512], payload.as_slice());

    // Reads route around the failed replica too.
    let mut buf = vec![0u8; 512];
    volume.read_at(&mut buf, 0).unwrap();
    assert_eq!(buf, payload);

    volume.close();
}

#[test]
fn fully_failed_volume_errors() {
    let (_store, client) = start_replica(1 << 16);
    client.set_error("replica gone");
    let volume = Volume::new("vol0", vec![client]);

    assert!(volume.write_at(&[1, 2, 3], 0).is_err());
    assert!(volume.read_at(&mut [0u8; 4], 0).is_err());
    volume.close();
}

#[test]
fn unmap_fans_out() {
    let (store_a, client_a) = start_replica(1 << 16);
    let (store_b, client_b) = start_replica(1 << 16);
    let volume = Volume::new("vol0", vec![client_a, client_b]);

    volume.write_at(&[0xFF; 4096], 0).unwrap();
    volume.unmap_at(4096, 0).unwrap();

    assert_eq!(&store_a.snapshot()[..4096], &[0u8; 4096]);
    assert_eq!(&store_b.snapshot()[..4096], &[0u8; 4096]);
    volume.close();
}
